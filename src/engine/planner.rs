// ==========================================
// Rake Formation DSS - Rake Formation Planner
// ==========================================
// Allocates ledger stock into rake formations under priority and
// capacity constraints and advances the formation lifecycle.
// Cross-store effects are applied in the fixed order Ledger ->
// Registry -> Formations and compensated on failure, so every
// failing operation leaves all stores in their pre-call state.
// ==========================================

use crate::config::ConfigManager;
use crate::domain::rake::{AllocationShortfall, LoadedMaterial, MaterialDemand, RakeFormation};
use crate::domain::types::{FormationState, Priority};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::estimator::CostTimeEstimator;
use crate::engine::events::{EngineEvent, EngineEventType, OptionalEventPublisher};
use crate::store::error::StoreError;
use crate::store::formation_store::FormationStore;
use crate::store::ledger::InventoryLedger;
use crate::store::registry::{EnqueueOutcome, LoadingPointRegistry};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const QTY_EPS: f64 = 1e-6;

// ==========================================
// AllocationReport - outcome of one allocate call
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub formation_id: String,
    pub allocated_t: f64,
    pub state: FormationState,
    pub shortfalls: Vec<AllocationShortfall>,
    pub queue_position: usize,
}

// ==========================================
// RakeFormationPlanner
// ==========================================
pub struct RakeFormationPlanner {
    ledger: Arc<InventoryLedger>,
    registry: Arc<LoadingPointRegistry>,
    formations: Arc<FormationStore>,
    estimator: CostTimeEstimator,
    config: Arc<ConfigManager>,
    events: OptionalEventPublisher,
}

impl RakeFormationPlanner {
    pub fn new(
        ledger: Arc<InventoryLedger>,
        registry: Arc<LoadingPointRegistry>,
        formations: Arc<FormationStore>,
        estimator: CostTimeEstimator,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            ledger,
            registry,
            formations,
            estimator,
            config,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    // ==========================================
    // Lifecycle: create
    // ==========================================

    /// Create a Planning-state formation. No inventory is reserved
    /// yet; that happens at `allocate`.
    pub fn create_formation(
        &self,
        destination: &str,
        loading_point_id: &str,
        capacity_t: Option<f64>,
        demands: Vec<MaterialDemand>,
    ) -> EngineResult<String> {
        self.registry.get(loading_point_id)?;

        let capacity_t = capacity_t.unwrap_or_else(|| self.config.current().default_rake_capacity_t);
        let formation_id = format!("RK-{}", Uuid::new_v4());
        let route = self.estimator.primary_route(destination);

        let formation = RakeFormation::new(
            formation_id.clone(),
            destination,
            route,
            loading_point_id,
            capacity_t,
            demands,
        );
        self.formations.insert(formation)?;

        tracing::info!(formation_id = %formation_id, destination, loading_point_id, capacity_t, "formation created");
        self.events.publish(
            EngineEvent::new(EngineEventType::FormationCreated, formation_id.clone())
                .with_detail(format!("destination={destination}")),
        );
        Ok(formation_id)
    }

    // ==========================================
    // Lifecycle: allocate
    // ==========================================

    /// Greedily reserve stock for each demand in priority order
    /// (High, Medium, Low; ties by declaration order), capped by the
    /// remaining formation capacity. A High-priority demand that gets
    /// nothing at all is a hard stop: the whole allocation rolls back.
    /// Medium/Low shortfalls are recorded and non-fatal.
    pub fn allocate(&self, formation_id: &str) -> EngineResult<AllocationReport> {
        let report = self.formations.with_formation::<_, EngineError, _>(formation_id, |f| {
            if f.status != FormationState::Planning {
                return Err(EngineError::InvalidStateTransition {
                    formation_id: f.formation_id.clone(),
                    from: f.status,
                    to: FormationState::Loading,
                });
            }

            let point = self.registry.get(&f.loading_point_id)?;

            let mut order: Vec<usize> = (0..f.demands.len()).collect();
            order.sort_by(|&a, &b| f.demands[b].priority.cmp(&f.demands[a].priority));

            let mut reserved_lines: Vec<LoadedMaterial> = Vec::new();
            let mut shortfalls: Vec<AllocationShortfall> = Vec::new();
            let mut allocated_total = 0.0_f64;

            for idx in order {
                let demand = f.demands[idx].clone();
                let remaining_cap = (f.capacity_t - allocated_total).max(0.0);
                let mut needed = demand.quantity_t.min(remaining_cap);
                let mut allocated = 0.0_f64;

                if needed > QTY_EPS {
                    let locations = self.ledger.locations_of(&demand.material_type)?;
                    for (location, available_t) in locations {
                        if needed <= QTY_EPS {
                            break;
                        }
                        let take = needed.min(available_t);
                        if take <= QTY_EPS {
                            continue;
                        }
                        match self.ledger.reserve(&demand.material_type, &location, take) {
                            Ok(()) => {
                                reserved_lines.push(LoadedMaterial {
                                    material_type: demand.material_type.clone(),
                                    location,
                                    quantity_t: take,
                                    priority: demand.priority,
                                });
                                allocated += take;
                                needed -= take;
                            }
                            Err(StoreError::InsufficientAvailable { .. }) => continue,
                            Err(e) => {
                                self.release_lines(&reserved_lines);
                                return Err(e.into());
                            }
                        }
                    }
                }

                if demand.priority == Priority::High
                    && allocated <= QTY_EPS
                    && demand.quantity_t > QTY_EPS
                {
                    self.release_lines(&reserved_lines);
                    return Err(EngineError::UnsatisfiableHighPriorityDemand {
                        formation_id: f.formation_id.clone(),
                        material_type: demand.material_type.clone(),
                        requested_t: demand.quantity_t,
                    });
                }

                if allocated + QTY_EPS < demand.quantity_t {
                    shortfalls.push(AllocationShortfall {
                        material_type: demand.material_type.clone(),
                        priority: demand.priority,
                        requested_t: demand.quantity_t,
                        allocated_t: allocated,
                    });
                }

                allocated_total += allocated;
            }

            let mut queue_position = 0usize;
            if allocated_total > QTY_EPS {
                match self.registry.enqueue(&f.loading_point_id, &f.formation_id) {
                    Ok(EnqueueOutcome::SlotGranted) => {
                        f.status = FormationState::Loading;
                        f.holds_slot = true;
                    }
                    Ok(EnqueueOutcome::Queued { position }) => {
                        f.status = FormationState::Loading;
                        f.holds_slot = false;
                        queue_position = position + 1;
                    }
                    Err(e) => {
                        self.release_lines(&reserved_lines);
                        return Err(e.into());
                    }
                }
            }

            f.materials = reserved_lines;
            f.current_load_t = allocated_total;
            f.shortfalls = shortfalls.clone();
            f.estimated_cost = Some(self.estimator.estimate_cost(f));
            f.estimated_hours =
                Some(self.estimator.estimate_hours(point.avg_loading_hours, queue_position));

            Ok(AllocationReport {
                formation_id: f.formation_id.clone(),
                allocated_t: allocated_total,
                state: f.status,
                shortfalls,
                queue_position,
            })
        })?;

        tracing::info!(
            formation_id,
            allocated_t = report.allocated_t,
            state = %report.state,
            shortfalls = report.shortfalls.len(),
            "formation allocated"
        );
        self.events.publish(
            EngineEvent::new(EngineEventType::FormationAllocated, formation_id)
                .with_detail(format!("allocated_t={}", report.allocated_t)),
        );
        Ok(report)
    }

    // ==========================================
    // Lifecycle: mark ready
    // ==========================================

    /// Loading -> Ready, allowed only at or above the configured fill
    /// threshold.
    pub fn mark_ready(&self, formation_id: &str) -> EngineResult<()> {
        let threshold = self.config.current().ready_threshold;

        self.formations.with_formation::<_, EngineError, _>(formation_id, |f| {
            if f.status != FormationState::Loading {
                return Err(EngineError::InvalidStateTransition {
                    formation_id: f.formation_id.clone(),
                    from: f.status,
                    to: FormationState::Ready,
                });
            }

            let fill = f.fill_fraction();
            if fill + QTY_EPS < threshold {
                return Err(EngineError::NotReady {
                    formation_id: f.formation_id.clone(),
                    fill_pct: fill * 100.0,
                    threshold_pct: threshold * 100.0,
                });
            }

            f.status = FormationState::Ready;
            Ok(())
        })?;

        tracing::info!(formation_id, "formation ready");
        self.events
            .publish(EngineEvent::new(EngineEventType::FormationReady, formation_id));
        Ok(())
    }

    // ==========================================
    // Lifecycle: dispatch
    // ==========================================

    /// Ready -> Dispatched (terminal). Consumes every reserved line,
    /// frees the wagon slot and promotes the queue head if any.
    pub fn dispatch(&self, formation_id: &str) -> EngineResult<()> {
        let (promoted, point_id) =
            self.formations.with_formation::<_, EngineError, _>(formation_id, |f| {
                if f.status != FormationState::Ready {
                    return Err(EngineError::InvalidStateTransition {
                        formation_id: f.formation_id.clone(),
                        from: f.status,
                        to: FormationState::Dispatched,
                    });
                }

                let mut consumed: Vec<LoadedMaterial> = Vec::new();
                for line in f.materials.clone() {
                    match self
                        .ledger
                        .consume(&line.material_type, &line.location, line.quantity_t)
                    {
                        Ok(()) => consumed.push(line),
                        Err(e) => {
                            self.restore_consumed(&consumed);
                            return Err(e.into());
                        }
                    }
                }

                let promoted = match self.registry.release_slot(&f.loading_point_id) {
                    Ok(promoted) => promoted,
                    Err(e) => {
                        self.restore_consumed(&consumed);
                        return Err(e.into());
                    }
                };

                f.status = FormationState::Dispatched;
                f.holds_slot = false;
                f.dispatched_at = Some(Utc::now());
                Ok((promoted, f.loading_point_id.clone()))
            })?;

        if let Some(promoted_id) = promoted {
            self.mark_promoted(&promoted_id, &point_id);
        }

        tracing::info!(formation_id, "formation dispatched");
        self.events
            .publish(EngineEvent::new(EngineEventType::FormationDispatched, formation_id));
        Ok(())
    }

    // ==========================================
    // Lifecycle: cancel
    // ==========================================

    /// Remove a non-dispatched formation, releasing its reservations
    /// and freeing its slot or queue entry. Dispatched history is
    /// immutable and cannot be cancelled.
    pub fn cancel(&self, formation_id: &str) -> EngineResult<()> {
        let formation = self.formations.remove(formation_id)?;

        let mut released: Vec<LoadedMaterial> = Vec::new();
        for line in formation.materials.clone() {
            match self
                .ledger
                .release(&line.material_type, &line.location, line.quantity_t)
            {
                Ok(()) => released.push(line),
                Err(e) => {
                    self.rereserve_lines(&released);
                    self.formations.reinsert(formation);
                    return Err(e.into());
                }
            }
        }

        if formation.status == FormationState::Loading || formation.status == FormationState::Ready
        {
            let registry_result = if formation.holds_slot {
                self.registry
                    .release_slot(&formation.loading_point_id)
                    .map(|promoted| {
                        if let Some(promoted_id) = promoted {
                            self.mark_promoted(&promoted_id, &formation.loading_point_id);
                        }
                    })
            } else {
                self.registry
                    .remove_queued(&formation.loading_point_id, formation_id)
                    .map(|_| ())
            };

            if let Err(e) = registry_result {
                self.rereserve_lines(&released);
                self.formations.reinsert(formation);
                return Err(e.into());
            }
        }

        tracing::info!(formation_id, "formation cancelled");
        self.events
            .publish(EngineEvent::new(EngineEventType::FormationCancelled, formation_id));
        Ok(())
    }

    // ==========================================
    // Recommendation mutations
    // ==========================================

    /// Stable re-sort of a formation's lines into priority order.
    pub fn reorder_materials(&self, formation_id: &str) -> EngineResult<()> {
        self.formations.with_formation::<_, EngineError, _>(formation_id, |f| {
            if !matches!(f.status, FormationState::Planning | FormationState::Loading) {
                return Err(EngineError::BusinessRuleViolation(format!(
                    "formation {} in state {} cannot be reordered",
                    f.formation_id, f.status
                )));
            }

            f.demands.sort_by(|a, b| b.priority.cmp(&a.priority));
            f.materials.sort_by(|a, b| b.priority.cmp(&a.priority));
            Ok(())
        })?;

        tracing::info!(formation_id, "loading sequence reordered");
        Ok(())
    }

    /// Fold the donor's demands into the primary and drop the donor.
    /// Both must still be Planning; the combined demand must fit the
    /// primary's capacity.
    pub fn merge_formations(&self, primary_id: &str, donor_id: &str) -> EngineResult<()> {
        let donor = self.formations.remove(donor_id)?;
        if donor.status != FormationState::Planning {
            let state = donor.status;
            self.formations.reinsert(donor);
            return Err(EngineError::BusinessRuleViolation(format!(
                "merge donor {donor_id} is no longer in planning (state {state})"
            )));
        }

        let merge_result = self.formations.with_formation::<_, EngineError, _>(primary_id, |f| {
            if f.status != FormationState::Planning {
                return Err(EngineError::BusinessRuleViolation(format!(
                    "merge primary {} is no longer in planning (state {})",
                    f.formation_id, f.status
                )));
            }

            let combined_t = f.demand_total_t() + donor.demand_total_t();
            if combined_t > f.capacity_t + QTY_EPS {
                return Err(EngineError::BusinessRuleViolation(format!(
                    "merged demand {combined_t}t exceeds capacity {}t of {}",
                    f.capacity_t, f.formation_id
                )));
            }

            f.demands.extend(donor.demands.iter().cloned());
            Ok(())
        });

        match merge_result {
            Ok(()) => {
                tracing::info!(primary_id, donor_id, "formations merged");
                Ok(())
            }
            Err(e) => {
                self.formations.reinsert(donor);
                Err(e)
            }
        }
    }

    /// Point a formation at an alternate route.
    pub fn switch_route(&self, formation_id: &str, route: &str) -> EngineResult<()> {
        self.formations.with_formation::<_, EngineError, _>(formation_id, |f| {
            if f.status == FormationState::Dispatched {
                return Err(EngineError::BusinessRuleViolation(format!(
                    "formation {} already dispatched, route is immutable",
                    f.formation_id
                )));
            }
            f.route = route.to_string();
            Ok(())
        })?;

        tracing::info!(formation_id, route, "route switched");
        Ok(())
    }

    /// Move a queued rake to a peer point. The rake keeps FIFO
    /// fairness at the new point (it joins at the tail, or starts
    /// loading immediately when a slot is free).
    pub fn reassign_queued(
        &self,
        from_point: &str,
        to_point: &str,
        rake_id: &str,
    ) -> EngineResult<EnqueueOutcome> {
        let position = self
            .registry
            .queue_position(from_point, rake_id)?
            .ok_or_else(|| {
                EngineError::BusinessRuleViolation(format!(
                    "rake {rake_id} is not queued at {from_point}"
                ))
            })?;

        if !self.registry.remove_queued(from_point, rake_id)? {
            return Err(EngineError::BusinessRuleViolation(format!(
                "rake {rake_id} is not queued at {from_point}"
            )));
        }

        let outcome = match self.registry.enqueue(to_point, rake_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(restore) = self.registry.insert_queued(from_point, rake_id, position) {
                    tracing::error!(rake_id, from_point, error = %restore, "failed to restore queue entry after reassignment failure");
                }
                return Err(e.into());
            }
        };

        let avg_hours = self.registry.get(to_point).map(|p| p.avg_loading_hours).unwrap_or(0.0);
        let update = self.formations.with_formation::<_, EngineError, _>(rake_id, |f| {
            f.loading_point_id = to_point.to_string();
            f.holds_slot = matches!(outcome, EnqueueOutcome::SlotGranted);
            let queue_position = match outcome {
                EnqueueOutcome::SlotGranted => 0,
                EnqueueOutcome::Queued { position } => position + 1,
            };
            f.estimated_hours = Some(self.estimator.estimate_hours(avg_hours, queue_position));
            Ok(())
        });

        if let Err(e) = update {
            match outcome {
                EnqueueOutcome::SlotGranted => {
                    if let Err(restore) = self.registry.release_slot(to_point) {
                        tracing::error!(rake_id, to_point, error = %restore, "failed to free slot after reassignment failure");
                    }
                }
                EnqueueOutcome::Queued { .. } => {
                    if let Err(restore) = self.registry.remove_queued(to_point, rake_id) {
                        tracing::error!(rake_id, to_point, error = %restore, "failed to drop queue entry after reassignment failure");
                    }
                }
            }
            if let Err(restore) = self.registry.insert_queued(from_point, rake_id, position) {
                tracing::error!(rake_id, from_point, error = %restore, "failed to restore queue entry after reassignment failure");
            }
            return Err(e);
        }

        tracing::info!(rake_id, from_point, to_point, "queued rake reassigned");
        Ok(outcome)
    }

    // ==========================================
    // Estimates
    // ==========================================

    pub fn estimate_cost(&self, formation_id: &str) -> EngineResult<i64> {
        let formation = self.formations.get(formation_id)?;
        Ok(self.estimator.estimate_cost(&formation))
    }

    pub fn estimate_time_hours(&self, formation_id: &str) -> EngineResult<f64> {
        let formation = self.formations.get(formation_id)?;
        let point = self.registry.get(&formation.loading_point_id)?;

        let queue_position = if formation.holds_slot {
            0
        } else {
            point.queue_position(formation_id).map(|p| p + 1).unwrap_or(0)
        };
        Ok(self
            .estimator
            .estimate_hours(point.avg_loading_hours, queue_position))
    }

    // ==========================================
    // Internals
    // ==========================================

    /// Undo reservations taken earlier in a failing allocation.
    fn release_lines(&self, lines: &[LoadedMaterial]) {
        for line in lines.iter().rev() {
            if let Err(e) =
                self.ledger
                    .release(&line.material_type, &line.location, line.quantity_t)
            {
                tracing::error!(
                    material_type = %line.material_type,
                    location = %line.location,
                    error = %e,
                    "reservation rollback failed"
                );
            }
        }
    }

    /// Re-reserve lines released by a failing cancel.
    fn rereserve_lines(&self, lines: &[LoadedMaterial]) {
        for line in lines.iter().rev() {
            if let Err(e) =
                self.ledger
                    .reserve(&line.material_type, &line.location, line.quantity_t)
            {
                tracing::error!(
                    material_type = %line.material_type,
                    location = %line.location,
                    error = %e,
                    "reservation restore failed"
                );
            }
        }
    }

    /// Put back stock consumed earlier in a failing dispatch.
    fn restore_consumed(&self, lines: &[LoadedMaterial]) {
        for line in lines.iter().rev() {
            let restore = self
                .ledger
                .receive(&line.material_type, &line.location, line.quantity_t)
                .and_then(|_| {
                    self.ledger
                        .reserve(&line.material_type, &line.location, line.quantity_t)
                });
            if let Err(e) = restore {
                tracing::error!(
                    material_type = %line.material_type,
                    location = %line.location,
                    error = %e,
                    "consume rollback failed"
                );
            }
        }
    }

    /// A promoted queue head now holds a slot; refresh its record.
    fn mark_promoted(&self, promoted_id: &str, point_id: &str) {
        let avg_hours = self
            .registry
            .get(point_id)
            .map(|p| p.avg_loading_hours)
            .unwrap_or(0.0);

        let result = self.formations.with_formation::<_, EngineError, _>(promoted_id, |f| {
            f.holds_slot = true;
            f.estimated_hours = Some(self.estimator.estimate_hours(avg_hours, 0));
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(promoted_id, error = %e, "failed to mark promoted rake");
        }
    }
}
