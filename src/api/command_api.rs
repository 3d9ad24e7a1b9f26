// ==========================================
// Rake Formation DSS - Command API
// ==========================================
// Mutation entry points consumed by order intake, stock feeds and
// the dashboard's action hooks. Inputs are validated up front; all
// outcomes are explicit success-or-error.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::domain::rake::MaterialDemand;
use crate::domain::types::{OperationalState, Priority};
use crate::engine::events::{EngineEvent, EngineEventType, OptionalEventPublisher};
use crate::engine::planner::{AllocationReport, RakeFormationPlanner};
use crate::engine::recommender::RecommendationEngine;
use crate::store::ledger::InventoryLedger;
use crate::store::registry::LoadingPointRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// Inbound shapes
// ==========================================

/// An order accepted from sales/logistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntake {
    pub destination: String,
    pub loading_point_preference: Option<String>,
    pub material_demands: Vec<MaterialDemandRequest>,
    /// Rake capacity override (tonnes); plant default when absent.
    pub capacity_t: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDemandRequest {
    pub material_type: String,
    pub quantity_t: f64,
    pub priority: Priority,
}

/// A stock movement reported by the yard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockEventKind {
    Receipt,
    Adjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEvent {
    pub material_type: String,
    pub location: String,
    pub delta_t: f64,
    pub kind: StockEventKind,
}

// ==========================================
// CommandApi
// ==========================================
pub struct CommandApi {
    ledger: Arc<InventoryLedger>,
    registry: Arc<LoadingPointRegistry>,
    planner: Arc<RakeFormationPlanner>,
    recommender: Arc<RecommendationEngine>,
    events: OptionalEventPublisher,
}

impl CommandApi {
    pub fn new(
        ledger: Arc<InventoryLedger>,
        registry: Arc<LoadingPointRegistry>,
        planner: Arc<RakeFormationPlanner>,
        recommender: Arc<RecommendationEngine>,
    ) -> Self {
        Self {
            ledger,
            registry,
            planner,
            recommender,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    // ==========================================
    // Plant configuration
    // ==========================================

    pub fn define_stock(
        &self,
        material_type: &str,
        location: &str,
        capacity_t: f64,
    ) -> ApiResult<()> {
        validator::validate_identifier("material_type", material_type)?;
        validator::validate_identifier("location", location)?;
        validator::validate_quantity("capacity_t", capacity_t)?;

        self.ledger.define_stock(material_type, location, capacity_t)?;
        Ok(())
    }

    pub fn register_loading_point(
        &self,
        point_id: &str,
        name: &str,
        class_code: &str,
        capacity_slots: u32,
        avg_loading_hours: f64,
    ) -> ApiResult<()> {
        validator::validate_identifier("point_id", point_id)?;
        validator::validate_identifier("name", name)?;
        validator::validate_identifier("class_code", class_code)?;
        if capacity_slots == 0 {
            return Err(ApiError::ValidationError(
                "capacity_slots must be at least 1".to_string(),
            ));
        }
        validator::validate_hours("avg_loading_hours", avg_loading_hours)?;

        self.registry
            .register_point(point_id, name, class_code, capacity_slots, avg_loading_hours)?;
        Ok(())
    }

    // ==========================================
    // Order intake
    // ==========================================

    /// Accept an order: resolve the loading point (explicit
    /// preference, else the least-utilized point still accepting
    /// rakes) and create a Planning formation.
    pub fn submit_order(&self, order: OrderIntake) -> ApiResult<String> {
        validator::validate_identifier("destination", &order.destination)?;
        if order.material_demands.is_empty() {
            return Err(ApiError::ValidationError(
                "material_demands must not be empty".to_string(),
            ));
        }
        for demand in &order.material_demands {
            validator::validate_identifier("material_type", &demand.material_type)?;
            validator::validate_quantity("quantity_t", demand.quantity_t)?;
        }
        if let Some(capacity_t) = order.capacity_t {
            validator::validate_quantity("capacity_t", capacity_t)?;
        }

        let point_id = self.resolve_loading_point(order.loading_point_preference.as_deref())?;
        let demands: Vec<MaterialDemand> = order
            .material_demands
            .iter()
            .map(|d| MaterialDemand {
                material_type: d.material_type.clone(),
                quantity_t: d.quantity_t,
                priority: d.priority,
            })
            .collect();

        let formation_id =
            self.planner
                .create_formation(&order.destination, &point_id, order.capacity_t, demands)?;
        Ok(formation_id)
    }

    // ==========================================
    // Stock events
    // ==========================================

    pub fn apply_stock_event(&self, event: StockEvent) -> ApiResult<()> {
        validator::validate_identifier("material_type", &event.material_type)?;
        validator::validate_identifier("location", &event.location)?;

        match event.kind {
            StockEventKind::Receipt => {
                validator::validate_quantity("delta_t", event.delta_t)?;
                self.ledger
                    .receive(&event.material_type, &event.location, event.delta_t)?;
            }
            StockEventKind::Adjustment => {
                validator::validate_delta("delta_t", event.delta_t)?;
                self.ledger
                    .adjust(&event.material_type, &event.location, event.delta_t)?;
            }
        }

        self.events.publish(
            EngineEvent::new(
                EngineEventType::StockChanged,
                format!("{}@{}", event.material_type, event.location),
            )
            .with_detail(format!("delta_t={}", event.delta_t)),
        );
        Ok(())
    }

    // ==========================================
    // Formation commands (dashboard hooks)
    // ==========================================

    /// `onOptimize`: allocate inventory into the formation.
    pub fn optimize(&self, formation_id: &str) -> ApiResult<AllocationReport> {
        validator::validate_identifier("formation_id", formation_id)?;
        Ok(self.planner.allocate(formation_id)?)
    }

    pub fn mark_ready(&self, formation_id: &str) -> ApiResult<()> {
        validator::validate_identifier("formation_id", formation_id)?;
        Ok(self.planner.mark_ready(formation_id)?)
    }

    /// `onDispatch`: consume reservations, free the slot, close out.
    pub fn dispatch(&self, formation_id: &str) -> ApiResult<()> {
        validator::validate_identifier("formation_id", formation_id)?;
        Ok(self.planner.dispatch(formation_id)?)
    }

    pub fn cancel_formation(&self, formation_id: &str) -> ApiResult<()> {
        validator::validate_identifier("formation_id", formation_id)?;
        Ok(self.planner.cancel(formation_id)?)
    }

    // ==========================================
    // Loading point commands
    // ==========================================

    pub fn set_loading_point_state(
        &self,
        point_id: &str,
        state: OperationalState,
    ) -> ApiResult<()> {
        validator::validate_identifier("point_id", point_id)?;
        self.registry.set_state(point_id, state)?;

        self.events.publish(
            EngineEvent::new(EngineEventType::LoadingPointChanged, point_id)
                .with_detail(format!("state={state}")),
        );
        Ok(())
    }

    // ==========================================
    // Recommendation commands (dashboard hooks)
    // ==========================================

    /// `onImplement`: apply the proposal's mutation, all-or-nothing.
    pub fn implement_recommendation(&self, id: &str) -> ApiResult<()> {
        validator::validate_identifier("id", id)?;
        Ok(self.recommender.implement(id)?)
    }

    /// `onDismiss`: drop the proposal; idempotent.
    pub fn dismiss_recommendation(&self, id: &str) -> ApiResult<()> {
        validator::validate_identifier("id", id)?;
        Ok(self.recommender.dismiss(id)?)
    }

    // ==========================================
    // Internals
    // ==========================================

    fn resolve_loading_point(&self, preference: Option<&str>) -> ApiResult<String> {
        if let Some(point_id) = preference {
            validator::validate_identifier("loading_point_preference", point_id)?;
            let point = self.registry.get(point_id)?;
            if point.state.is_override() {
                return Err(ApiError::ConstraintViolation(format!(
                    "loading point {point_id} is {} and not accepting rakes",
                    point.state
                )));
            }
            return Ok(point_id.to_string());
        }

        let mut points = self.registry.snapshot()?;
        points.retain(|p| !p.state.is_override());
        points.sort_by(|a, b| {
            a.utilization_pct()
                .total_cmp(&b.utilization_pct())
                .then_with(|| a.queue_length().cmp(&b.queue_length()))
                .then_with(|| a.point_id.cmp(&b.point_id))
        });

        points
            .first()
            .map(|p| p.point_id.clone())
            .ok_or_else(|| {
                ApiError::ConstraintViolation("no loading point is accepting rakes".to_string())
            })
    }
}
