// ==========================================
// Rake Formation DSS - Engine Event Publishing
// ==========================================
// The engine layer defines the publisher trait; outer layers supply
// the adapter, so the engine never depends on its consumers.
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// Engine event types
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEventType {
    FormationCreated,
    FormationAllocated,
    FormationReady,
    FormationDispatched,
    FormationCancelled,
    StockChanged,
    LoadingPointChanged,
    RecommendationImplemented,
    EvaluationCompleted,
}

impl EngineEventType {
    pub fn as_str(&self) -> &str {
        match self {
            EngineEventType::FormationCreated => "FormationCreated",
            EngineEventType::FormationAllocated => "FormationAllocated",
            EngineEventType::FormationReady => "FormationReady",
            EngineEventType::FormationDispatched => "FormationDispatched",
            EngineEventType::FormationCancelled => "FormationCancelled",
            EngineEventType::StockChanged => "StockChanged",
            EngineEventType::LoadingPointChanged => "LoadingPointChanged",
            EngineEventType::RecommendationImplemented => "RecommendationImplemented",
            EngineEventType::EvaluationCompleted => "EvaluationCompleted",
        }
    }
}

/// An engine-level state change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_type: EngineEventType,
    /// Primary entity the event is about.
    pub entity_id: String,
    /// Free-form detail for downstream consumers.
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(event_type: EngineEventType, entity_id: impl Into<String>) -> Self {
        Self {
            event_type,
            entity_id: entity_id.into(),
            detail: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// Publisher trait
// ==========================================

/// Engine event publisher. Implemented by outer layers (presentation
/// adapters, audit sinks); the engine only knows this trait.
pub trait EngineEventPublisher: Send + Sync {
    fn publish(&self, event: EngineEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// No-op publisher for scenarios that need no event fan-out
/// (unit tests, the scenario driver).
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl EngineEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: EngineEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            event_type = event.event_type.as_str(),
            entity_id = %event.entity_id,
            "event publish skipped (no-op publisher)"
        );
        Ok(())
    }
}

/// Simplifies `Option<Arc<dyn EngineEventPublisher>>` at call sites.
/// A publish failure is logged and swallowed: event fan-out must
/// never fail a state mutation that already committed.
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn EngineEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn EngineEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub fn publish(&self, event: EngineEvent) {
        if let Some(publisher) = &self.inner {
            if let Err(e) = publisher.publish(event) {
                tracing::warn!(error = %e, "engine event publish failed");
            }
        }
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
