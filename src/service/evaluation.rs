// ==========================================
// Rake Formation DSS - Evaluation Service
// ==========================================
// Periodic snapshot-evaluate-publish cycle. One cycle is bounded and
// non-interruptible; cancellation takes effect between cycles only.
// Snapshots are collected in the fixed store order (Ledger ->
// Registry -> Formations) so a cycle never evaluates torn state.
// ==========================================

use crate::config::ConfigManager;
use crate::domain::recommendation::Recommendation;
use crate::engine::error::EngineResult;
use crate::engine::events::{EngineEvent, EngineEventType, OptionalEventPublisher};
use crate::engine::recommender::{EngineSnapshots, RecommendationEngine};
use crate::store::formation_store::FormationStore;
use crate::store::ledger::InventoryLedger;
use crate::store::recommendation_store::RecommendationStore;
use crate::store::registry::LoadingPointRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ==========================================
// RecommendationSink - cycle output target
// ==========================================
#[async_trait]
pub trait RecommendationSink: Send + Sync {
    /// Publish one cycle's candidate batch; returns how many
    /// proposals are now live.
    async fn publish(&self, batch: Vec<Recommendation>) -> anyhow::Result<usize>;
}

/// Default sink: publish into the recommendation store.
pub struct StoreSink {
    store: Arc<RecommendationStore>,
}

impl StoreSink {
    pub fn new(store: Arc<RecommendationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RecommendationSink for StoreSink {
    async fn publish(&self, batch: Vec<Recommendation>) -> anyhow::Result<usize> {
        let report = self.store.replace_active(batch).map_err(anyhow::Error::new)?;
        Ok(report.inserted + report.refreshed)
    }
}

/// Sink that drops everything (unit tests).
#[derive(Debug, Clone, Default)]
pub struct NoOpSink;

#[async_trait]
impl RecommendationSink for NoOpSink {
    async fn publish(&self, batch: Vec<Recommendation>) -> anyhow::Result<usize> {
        tracing::debug!(candidates = batch.len(), "recommendation publish skipped (no-op sink)");
        Ok(0)
    }
}

// ==========================================
// EvaluationReport - outcome of one cycle
// ==========================================
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub candidates: usize,
    pub published: usize,
    pub completed_at: DateTime<Utc>,
}

// ==========================================
// EvaluationService
// ==========================================
pub struct EvaluationService {
    ledger: Arc<InventoryLedger>,
    registry: Arc<LoadingPointRegistry>,
    formations: Arc<FormationStore>,
    engine: Arc<RecommendationEngine>,
    config: Arc<ConfigManager>,
    sink: Arc<dyn RecommendationSink>,
    events: OptionalEventPublisher,
}

impl EvaluationService {
    pub fn new(
        ledger: Arc<InventoryLedger>,
        registry: Arc<LoadingPointRegistry>,
        formations: Arc<FormationStore>,
        engine: Arc<RecommendationEngine>,
        config: Arc<ConfigManager>,
        sink: Arc<dyn RecommendationSink>,
    ) -> Self {
        Self {
            ledger,
            registry,
            formations,
            engine,
            config,
            sink,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    /// Consistent read snapshot of the three entity stores, collected
    /// in the fixed global order.
    pub fn collect_snapshots(&self) -> EngineResult<EngineSnapshots> {
        let stocks = self.ledger.snapshot()?;
        let points = self.registry.snapshot()?;
        let formations = self.formations.snapshot()?;
        Ok(EngineSnapshots {
            stocks,
            points,
            formations,
        })
    }

    /// One bounded evaluation cycle: snapshot, evaluate, publish.
    pub async fn evaluate_once(&self) -> anyhow::Result<EvaluationReport> {
        let config = self.config.current();
        let snapshots = self.collect_snapshots().map_err(anyhow::Error::new)?;
        let candidates = self.engine.evaluate(&snapshots, &config);
        let candidate_count = candidates.len();

        let published = self.sink.publish(candidates).await?;

        let report = EvaluationReport {
            candidates: candidate_count,
            published,
            completed_at: Utc::now(),
        };
        tracing::info!(
            candidates = report.candidates,
            published = report.published,
            "evaluation cycle completed"
        );
        self.events.publish(
            EngineEvent::new(EngineEventType::EvaluationCompleted, "evaluation")
                .with_detail(format!("candidates={candidate_count}")),
        );
        Ok(report)
    }

    /// Periodic loop. The interval comes from the configuration at
    /// start time; a shutdown signal is honored between cycles, never
    /// mid-cycle.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval_secs = self.config.current().evaluation_interval_secs.max(1);
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        tracing::info!(interval_secs, "evaluation service started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(e) = self.evaluate_once().await {
                tracing::error!(error = %e, "evaluation cycle failed");
            }

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("evaluation service stopped");
    }

    /// Start the periodic loop on the current runtime.
    pub fn spawn(service: Arc<Self>) -> EvaluationHandle {
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(service.run(rx));
        EvaluationHandle { shutdown: tx, join }
    }
}

// ==========================================
// EvaluationHandle - cancellation between cycles
// ==========================================
pub struct EvaluationHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl EvaluationHandle {
    /// Request shutdown and wait for the loop to finish its current
    /// cycle.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}
