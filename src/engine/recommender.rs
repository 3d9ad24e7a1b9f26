// ==========================================
// Rake Formation DSS - Recommendation Engine
// ==========================================
// Scans consistent snapshots of the ledger, registry and planner
// state for optimization opportunities. `evaluate` is a pure
// function over the snapshots; `implement` applies the proposed
// mutation through the planner, all-or-nothing.
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::loading_point::LoadingPoint;
use crate::domain::material::MaterialStock;
use crate::domain::rake::RakeFormation;
use crate::domain::recommendation::{Recommendation, RecommendationTarget, RecommendedAction};
use crate::domain::types::{
    FormationState, OperationalState, Priority, RecommendationKind, RecommendationState,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::estimator::{CostTimeEstimator, RateTable};
use crate::engine::events::{EngineEvent, EngineEventType, OptionalEventPublisher};
use crate::engine::planner::RakeFormationPlanner;
use crate::store::recommendation_store::RecommendationStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Minimum congestion-weighted gain (hours) before a route switch is
/// worth proposing.
const ROUTE_GAIN_FLOOR_HOURS: f64 = 0.1;

// ==========================================
// EngineSnapshots - consistent read state for one evaluation
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshots {
    pub stocks: Vec<MaterialStock>,
    pub points: Vec<LoadingPoint>,
    pub formations: Vec<RakeFormation>,
}

// ==========================================
// AccuracyProvider - external collaborator
// ==========================================
// Historical per-rule hit rate in [0, 1], fed into the confidence
// score. Maintained outside the engine.
pub trait AccuracyProvider: Send + Sync {
    fn historical_accuracy(&self, kind: RecommendationKind) -> f64;
}

/// Built-in defaults used until a plant supplies measured accuracy.
#[derive(Debug, Clone, Default)]
pub struct StaticAccuracy;

impl AccuracyProvider for StaticAccuracy {
    fn historical_accuracy(&self, kind: RecommendationKind) -> f64 {
        match kind {
            RecommendationKind::Cost => 0.92,
            RecommendationKind::Efficiency => 0.87,
            RecommendationKind::Capacity => 0.81,
            RecommendationKind::Route => 0.78,
            RecommendationKind::Priority => 0.84,
        }
    }
}

// ==========================================
// RecommendationEngine
// ==========================================
pub struct RecommendationEngine {
    planner: Arc<RakeFormationPlanner>,
    store: Arc<RecommendationStore>,
    rate_table: Arc<dyn RateTable>,
    accuracy: Arc<dyn AccuracyProvider>,
    events: OptionalEventPublisher,
}

impl RecommendationEngine {
    pub fn new(
        planner: Arc<RakeFormationPlanner>,
        store: Arc<RecommendationStore>,
        rate_table: Arc<dyn RateTable>,
        accuracy: Arc<dyn AccuracyProvider>,
    ) -> Self {
        Self {
            planner,
            store,
            rate_table,
            accuracy,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    // ==========================================
    // Evaluation (pure)
    // ==========================================

    /// Produce candidate recommendations from one consistent snapshot.
    /// No store is touched; each rule triggers independently.
    pub fn evaluate(&self, snapshots: &EngineSnapshots, config: &EngineConfig) -> Vec<Recommendation> {
        let mut candidates = Vec::new();
        candidates.extend(self.rule_reorder(snapshots, config));
        candidates.extend(self.rule_merge(snapshots, config));
        candidates.extend(self.rule_route(snapshots, config));
        candidates.extend(self.rule_reassign(snapshots, config));
        candidates
    }

    /// Cost rule: a Planning/Loading formation whose lines are not in
    /// priority order pays avoidable demurrage while low-priority
    /// cargo blocks the sequence.
    fn rule_reorder(&self, snapshots: &EngineSnapshots, config: &EngineConfig) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for formation in &snapshots.formations {
            if !matches!(
                formation.status,
                FormationState::Planning | FormationState::Loading
            ) {
                continue;
            }

            let priorities: Vec<Priority> = if formation.status == FormationState::Planning {
                formation.demands.iter().map(|d| d.priority).collect()
            } else {
                formation.materials.iter().map(|m| m.priority).collect()
            };
            let inversions = priorities.windows(2).filter(|w| w[0] < w[1]).count();
            if inversions == 0 {
                continue;
            }

            let savings = (config.demurrage_rate_per_hour as f64
                * config.reorder_delay_hours_per_line
                * inversions as f64)
                .round() as i64;
            out.push(self.candidate(
                config,
                RecommendationKind::Cost,
                "Optimize material loading sequence",
                format!(
                    "Reorder the loading sequence of {} ({} out-of-order lines) to avoid demurrage on priority cargo.",
                    formation.formation_id, inversions
                ),
                Some(savings),
                Some(0.5),
                1.0,
                RecommendationTarget::Rake(formation.formation_id.clone()),
                RecommendedAction::ReorderMaterials {
                    formation_id: formation.formation_id.clone(),
                },
            ));
        }
        out
    }

    /// Efficiency rule: two under-filled Planning formations headed
    /// for the same distance tier can share a rake.
    fn rule_merge(&self, snapshots: &EngineSnapshots, config: &EngineConfig) -> Vec<Recommendation> {
        let mut by_tier: HashMap<String, Vec<&RakeFormation>> = HashMap::new();
        for formation in &snapshots.formations {
            if formation.status != FormationState::Planning {
                continue;
            }
            let demand_t = formation.demand_total_t();
            if demand_t <= 0.0 || demand_t >= config.merge_fill_below * formation.capacity_t {
                continue;
            }
            let tier = self.rate_table.distance_tier(&formation.destination);
            by_tier.entry(tier.to_string()).or_default().push(formation);
        }

        let mut out = Vec::new();
        for (_, mut group) in by_tier {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| {
                a.demand_total_t()
                    .total_cmp(&b.demand_total_t())
                    .then_with(|| a.formation_id.cmp(&b.formation_id))
            });

            let (first, second) = (group[0], group[1]);
            let (primary, donor) = if first.formation_id <= second.formation_id {
                (first, second)
            } else {
                (second, first)
            };
            if primary.demand_total_t() + donor.demand_total_t() > primary.capacity_t {
                continue;
            }

            out.push(self.candidate(
                config,
                RecommendationKind::Efficiency,
                "Combine under-filled rakes",
                format!(
                    "Merge {} into {} (same distance tier) to lift capacity utilization and free one rake.",
                    donor.formation_id, primary.formation_id
                ),
                Some(config.merge_base_saving),
                Some(2.0),
                1.0,
                RecommendationTarget::Rake(primary.formation_id.clone()),
                RecommendedAction::MergeFormations {
                    primary: primary.formation_id.clone(),
                    donor: donor.formation_id.clone(),
                },
            ));
        }
        out
    }

    /// Route rule: an alternate route with lower congestion-weighted
    /// time beats the formation's current choice.
    fn rule_route(&self, snapshots: &EngineSnapshots, config: &EngineConfig) -> Vec<Recommendation> {
        let estimator = CostTimeEstimator::new(Arc::clone(&self.rate_table));

        let mut out = Vec::new();
        for formation in &snapshots.formations {
            if formation.status == FormationState::Dispatched {
                continue;
            }

            let options = self.rate_table.routes(&formation.destination);
            let current = match options.iter().find(|o| o.route == formation.route) {
                Some(current) => current,
                None => continue,
            };
            let current_hours = estimator.route_hours(current);

            let best = options
                .iter()
                .filter(|o| o.route != formation.route)
                .min_by(|a, b| estimator.route_hours(a).total_cmp(&estimator.route_hours(b)));
            let best = match best {
                Some(best) => best,
                None => continue,
            };
            let best_hours = estimator.route_hours(best);
            if best_hours + ROUTE_GAIN_FLOOR_HOURS >= current_hours {
                continue;
            }

            let saved_hours = current_hours - best_hours;
            let savings = (saved_hours * config.demurrage_rate_per_hour as f64).round() as i64;
            out.push(self.candidate(
                config,
                RecommendationKind::Route,
                "Alternative route selection",
                format!(
                    "Switch {} from {} to {} to save {:.1}h of congestion-weighted transit.",
                    formation.formation_id, formation.route, best.route, saved_hours
                ),
                Some(savings),
                Some(0.0),
                1.0,
                RecommendationTarget::Rake(formation.formation_id.clone()),
                RecommendedAction::SwitchRoute {
                    formation_id: formation.formation_id.clone(),
                    route: best.route.clone(),
                },
            ));
        }
        out
    }

    /// Capacity/Priority rule: a point with a wait queue while a
    /// same-class peer sits Available. Kind is Priority when the
    /// waiting rake carries High-priority cargo.
    fn rule_reassign(&self, snapshots: &EngineSnapshots, config: &EngineConfig) -> Vec<Recommendation> {
        let formations_by_id: HashMap<&str, &RakeFormation> = snapshots
            .formations
            .iter()
            .map(|f| (f.formation_id.as_str(), f))
            .collect();

        let mut out = Vec::new();
        for point in &snapshots.points {
            if point.queue.is_empty() || point.state.is_override() {
                continue;
            }

            let peer = snapshots
                .points
                .iter()
                .filter(|p| {
                    p.point_id != point.point_id
                        && p.class_code == point.class_code
                        && p.effective_state() == OperationalState::Available
                        && p.has_free_slot()
                })
                .min_by(|a, b| a.point_id.cmp(&b.point_id));
            let peer = match peer {
                Some(peer) => peer,
                None => continue,
            };

            let rake_id = match point.queue.front() {
                Some(rake_id) => rake_id.clone(),
                None => continue,
            };

            let waiting = formations_by_id.get(rake_id.as_str());
            let (kind, completeness) = match waiting {
                Some(f) if f.has_high_priority_line() => (RecommendationKind::Priority, 1.0),
                Some(_) => (RecommendationKind::Capacity, 1.0),
                None => (RecommendationKind::Capacity, 0.5),
            };

            let savings =
                (point.avg_loading_hours * config.demurrage_rate_per_hour as f64).round() as i64;
            out.push(self.candidate(
                config,
                kind,
                "Rebalance loading point queues",
                format!(
                    "Move waiting rake {} from {} to idle peer {} to cut queue time.",
                    rake_id, point.point_id, peer.point_id
                ),
                Some(savings),
                Some(1.0),
                completeness,
                RecommendationTarget::LoadingPoint(point.point_id.clone()),
                RecommendedAction::ReassignQueuedRake {
                    from_point: point.point_id.clone(),
                    to_point: peer.point_id.clone(),
                    rake_id,
                },
            ));
        }
        out
    }

    // ==========================================
    // Lifecycle commands
    // ==========================================

    /// Apply a recommendation's mutation, all-or-nothing. On failure
    /// the planner has already rolled back its effects and the
    /// recommendation stays active for retry.
    pub fn implement(&self, id: &str) -> EngineResult<()> {
        let rec = self.store.get(id)?;
        if rec.state != RecommendationState::Active {
            return Err(EngineError::NotActive {
                id: id.to_string(),
                state: rec.state.to_string(),
            });
        }

        let applied: EngineResult<()> = match rec.action.clone() {
            RecommendedAction::ReorderMaterials { formation_id } => {
                self.planner.reorder_materials(&formation_id)
            }
            RecommendedAction::MergeFormations { primary, donor } => {
                self.planner.merge_formations(&primary, &donor)
            }
            RecommendedAction::SwitchRoute { formation_id, route } => {
                self.planner.switch_route(&formation_id, &route)
            }
            RecommendedAction::ReassignQueuedRake {
                from_point,
                to_point,
                rake_id,
            } => self
                .planner
                .reassign_queued(&from_point, &to_point, &rake_id)
                .map(|_| ()),
        };

        match applied {
            Ok(()) => {
                self.store.mark_implemented(id)?;
                self.events.publish(
                    EngineEvent::new(EngineEventType::RecommendationImplemented, id)
                        .with_detail(rec.title.clone()),
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "recommendation implementation rolled back");
                Err(EngineError::ImplementationFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Dismiss a proposal; idempotent for already terminal records.
    pub fn dismiss(&self, id: &str) -> EngineResult<()> {
        self.store.dismiss(id)?;
        Ok(())
    }

    /// Active proposals ranked for display.
    pub fn ranked_active(&self) -> EngineResult<Vec<Recommendation>> {
        Ok(self.store.active_ranked()?)
    }

    // ==========================================
    // Internals
    // ==========================================

    fn candidate(
        &self,
        config: &EngineConfig,
        kind: RecommendationKind,
        title: &str,
        description: String,
        potential_savings: Option<i64>,
        implementation_hours: Option<f64>,
        completeness: f64,
        target: RecommendationTarget,
        action: RecommendedAction,
    ) -> Recommendation {
        let accuracy = self.accuracy.historical_accuracy(kind);
        let confidence = (100.0
            * (config.confidence_completeness_weight * completeness
                + config.confidence_accuracy_weight * accuracy))
            .clamp(0.0, 100.0)
            .round();

        let now = Utc::now();
        Recommendation {
            id: format!("rec-{}", Uuid::new_v4()),
            kind,
            title: title.to_string(),
            description,
            impact: config.impact_for_savings(potential_savings),
            potential_savings,
            implementation_hours,
            confidence,
            target,
            action,
            state: RecommendationState::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
