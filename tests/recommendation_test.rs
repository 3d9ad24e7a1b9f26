// ==========================================
// Recommendation Engine - rule, ranking and lifecycle tests
// ==========================================

use rake_formation_dss::domain::recommendation::{Recommendation, RecommendedAction};
use rake_formation_dss::store::{
    FormationStore, InventoryLedger, LoadingPointRegistry, LockSettings, RecommendationStore,
};
use rake_formation_dss::{
    ConfigManager, CostTimeEstimator, DistanceTier, EngineError, EngineSnapshots, FormationState,
    ImpactLevel, MaterialDemand, Priority, RakeFormationPlanner, RateTable, RecommendationEngine,
    RecommendationKind, RecommendationState, RouteOption, StaticAccuracy, StaticRateTable,
};
use std::sync::Arc;

struct Harness {
    ledger: Arc<InventoryLedger>,
    registry: Arc<LoadingPointRegistry>,
    formations: Arc<FormationStore>,
    recommendations: Arc<RecommendationStore>,
    planner: Arc<RakeFormationPlanner>,
    recommender: Arc<RecommendationEngine>,
    config: Arc<ConfigManager>,
}

impl Harness {
    fn new(rate_table: StaticRateTable) -> Self {
        let settings = LockSettings::default();
        let config = Arc::new(ConfigManager::new());
        let rate_table: Arc<dyn RateTable> = Arc::new(rate_table);

        let ledger = Arc::new(InventoryLedger::new(settings));
        let registry = Arc::new(LoadingPointRegistry::new(settings));
        let formations = Arc::new(FormationStore::new(settings));
        let recommendations = Arc::new(RecommendationStore::new(settings));

        let planner = Arc::new(RakeFormationPlanner::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&formations),
            CostTimeEstimator::new(Arc::clone(&rate_table)),
            Arc::clone(&config),
        ));
        let recommender = Arc::new(RecommendationEngine::new(
            Arc::clone(&planner),
            Arc::clone(&recommendations),
            rate_table,
            Arc::new(StaticAccuracy),
        ));

        Self {
            ledger,
            registry,
            formations,
            recommendations,
            planner,
            recommender,
            config,
        }
    }

    fn snapshots(&self) -> EngineSnapshots {
        EngineSnapshots {
            stocks: self.ledger.snapshot().unwrap(),
            points: self.registry.snapshot().unwrap(),
            formations: self.formations.snapshot().unwrap(),
        }
    }

    fn evaluate_and_publish(&self) -> Vec<Recommendation> {
        let candidates = self
            .recommender
            .evaluate(&self.snapshots(), &self.config.current());
        self.recommendations.replace_active(candidates).unwrap();
        self.recommendations.active_ranked().unwrap()
    }
}

fn demand(material_type: &str, quantity_t: f64, priority: Priority) -> MaterialDemand {
    MaterialDemand {
        material_type: material_type.to_string(),
        quantity_t,
        priority,
    }
}

#[test]
fn reorder_rule_fires_on_priority_inversion_and_implements() {
    let h = Harness::new(StaticRateTable::new(30));
    h.registry.register_point("LP-001", "Main Loading Bay 1", "general", 2, 4.0).unwrap();

    let id = h
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(2_000.0),
            vec![
                demand("Galvanized Sheets", 200.0, Priority::Low),
                demand("Hot Rolled Coils", 1_200.0, Priority::High),
            ],
        )
        .unwrap();

    let active = h.evaluate_and_publish();
    assert_eq!(active.len(), 1);
    let rec = &active[0];
    assert_eq!(rec.kind, RecommendationKind::Cost);
    assert_eq!(
        rec.action,
        RecommendedAction::ReorderMaterials {
            formation_id: id.clone()
        }
    );
    // One inversion at 1500 rupees/h and 0.5h per line.
    assert_eq!(rec.potential_savings, Some(750));

    h.recommender.implement(&rec.id).unwrap();

    let formation = h.formations.get(&id).unwrap();
    assert_eq!(formation.demands[0].priority, Priority::High);
    assert_eq!(formation.demands[1].priority, Priority::Low);
    assert_eq!(
        h.recommendations.get(&rec.id).unwrap().state,
        RecommendationState::Implemented
    );
    assert_eq!(h.recommendations.implemented_savings_total().unwrap(), 750);

    // The next cycle no longer proposes it.
    assert!(h.evaluate_and_publish().is_empty());
}

#[test]
fn merge_rule_combines_underfilled_planning_formations() {
    let rate_table = StaticRateTable::new(30).with_tier("Port Terminal", DistanceTier::National);
    let h = Harness::new(rate_table);
    h.registry.register_point("LP-003", "Heavy Material Bay", "heavy", 3, 5.1).unwrap();

    let a = h
        .planner
        .create_formation(
            "Port Terminal",
            "LP-003",
            Some(3_000.0),
            vec![demand("Iron Ore", 800.0, Priority::Medium)],
        )
        .unwrap();
    let b = h
        .planner
        .create_formation(
            "Port Terminal",
            "LP-003",
            Some(3_000.0),
            vec![demand("Iron Ore", 600.0, Priority::Low)],
        )
        .unwrap();

    let active = h.evaluate_and_publish();
    let rec = active
        .iter()
        .find(|r| r.kind == RecommendationKind::Efficiency)
        .expect("merge recommendation expected");
    assert_eq!(rec.impact, ImpactLevel::Medium);
    assert_eq!(rec.potential_savings, Some(8_500));

    let (primary, donor) = match &rec.action {
        RecommendedAction::MergeFormations { primary, donor } => (primary.clone(), donor.clone()),
        other => panic!("expected merge action, got {other:?}"),
    };
    assert!([a.clone(), b.clone()].contains(&primary));
    assert!([a, b].contains(&donor));

    h.recommender.implement(&rec.id).unwrap();

    assert!(!h.formations.contains(&donor));
    let merged = h.formations.get(&primary).unwrap();
    assert_eq!(merged.demand_total_t(), 1_400.0);
    assert_eq!(merged.demands.len(), 2);
}

#[test]
fn merge_failure_rolls_back_and_keeps_recommendation_active() {
    let rate_table = StaticRateTable::new(30).with_tier("Port Terminal", DistanceTier::National);
    let h = Harness::new(rate_table);
    h.ledger.define_stock("Iron Ore", "Stockyard C", 10_000.0).unwrap();
    h.ledger.receive("Iron Ore", "Stockyard C", 4_000.0).unwrap();
    h.registry.register_point("LP-003", "Heavy Material Bay", "heavy", 3, 5.1).unwrap();

    h.planner
        .create_formation(
            "Port Terminal",
            "LP-003",
            Some(3_000.0),
            vec![demand("Iron Ore", 800.0, Priority::Medium)],
        )
        .unwrap();
    h.planner
        .create_formation(
            "Port Terminal",
            "LP-003",
            Some(3_000.0),
            vec![demand("Iron Ore", 600.0, Priority::Low)],
        )
        .unwrap();

    let active = h.evaluate_and_publish();
    let rec = active
        .iter()
        .find(|r| r.kind == RecommendationKind::Efficiency)
        .unwrap();
    let donor = match &rec.action {
        RecommendedAction::MergeFormations { donor, .. } => donor.clone(),
        other => panic!("expected merge action, got {other:?}"),
    };

    // The donor starts loading before the operator clicks implement.
    h.planner.allocate(&donor).unwrap();
    let donor_before = h.formations.get(&donor).unwrap();
    assert_eq!(donor_before.status, FormationState::Loading);

    let err = h.recommender.implement(&rec.id).unwrap_err();
    assert!(matches!(err, EngineError::ImplementationFailed { .. }));

    // Rolled back: the donor is intact and the proposal stays active
    // for retry.
    let donor_after = h.formations.get(&donor).unwrap();
    assert_eq!(donor_after.status, FormationState::Loading);
    assert_eq!(donor_after.current_load_t, donor_before.current_load_t);
    assert_eq!(
        h.recommendations.get(&rec.id).unwrap().state,
        RecommendationState::Active
    );
}

#[test]
fn route_rule_switches_to_less_congested_route() {
    let rate_table = StaticRateTable::new(30)
        .with_tier("CMO Stockyard A", DistanceTier::Regional)
        .with_routes(
            "CMO Stockyard A",
            vec![
                RouteOption { route: "cmo-main".to_string(), base_hours: 6.0 },
                RouteOption { route: "cmo-bypass".to_string(), base_hours: 7.5 },
            ],
        )
        .with_congestion("cmo-main", 1.6);
    let h = Harness::new(rate_table);
    h.registry.register_point("LP-001", "Main Loading Bay 1", "general", 2, 4.0).unwrap();

    let id = h
        .planner
        .create_formation(
            "CMO Stockyard A",
            "LP-001",
            Some(2_500.0),
            vec![demand("Hot Rolled Coils", 1_200.0, Priority::High)],
        )
        .unwrap();
    assert_eq!(h.formations.get(&id).unwrap().route, "cmo-main");

    let active = h.evaluate_and_publish();
    let rec = active
        .iter()
        .find(|r| r.kind == RecommendationKind::Route)
        .expect("route recommendation expected");

    // 6.0h * 1.6 = 9.6h congested vs 7.5h bypass: 2.1h saved at 1500/h.
    assert_eq!(rec.potential_savings, Some(3_150));
    assert_eq!(rec.impact, ImpactLevel::Medium);
    assert_eq!(rec.confidence, 87.0);

    h.recommender.implement(&rec.id).unwrap();
    assert_eq!(h.formations.get(&id).unwrap().route, "cmo-bypass");
}

#[test]
fn reassign_rule_moves_queue_head_to_idle_peer() {
    let h = Harness::new(StaticRateTable::new(30));
    h.ledger.define_stock("Steel Plates", "Stockyard B", 5_000.0).unwrap();
    h.ledger.receive("Steel Plates", "Stockyard B", 2_000.0).unwrap();
    h.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.2).unwrap();
    h.registry.register_point("LP-004", "Main Loading Bay 2", "general", 1, 4.0).unwrap();

    let first = h
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![demand("Steel Plates", 500.0, Priority::Medium)],
        )
        .unwrap();
    let waiting = h
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![demand("Steel Plates", 500.0, Priority::High)],
        )
        .unwrap();
    h.planner.allocate(&first).unwrap();
    h.planner.allocate(&waiting).unwrap();

    let active = h.evaluate_and_publish();
    let rec = active
        .iter()
        .find(|r| {
            matches!(
                r.action,
                RecommendedAction::ReassignQueuedRake { .. }
            )
        })
        .expect("reassignment recommendation expected");

    // The waiting rake carries High-priority cargo.
    assert_eq!(rec.kind, RecommendationKind::Priority);

    h.recommender.implement(&rec.id).unwrap();

    let moved = h.formations.get(&waiting).unwrap();
    assert_eq!(moved.loading_point_id, "LP-004");
    assert!(moved.holds_slot);
    assert_eq!(h.registry.get("LP-001").unwrap().queue_length(), 0);
    assert_eq!(h.registry.get("LP-004").unwrap().active_rakes, 1);
}

#[test]
fn ranking_puts_higher_impact_first() {
    let rate_table = StaticRateTable::new(30).with_tier("Port Terminal", DistanceTier::National);
    let h = Harness::new(rate_table);
    h.registry.register_point("LP-003", "Heavy Material Bay", "heavy", 3, 5.1).unwrap();

    // Merge candidates (Medium impact) and one priority inversion
    // (Low impact) in the same plant.
    h.planner
        .create_formation(
            "Port Terminal",
            "LP-003",
            Some(3_000.0),
            vec![demand("Iron Ore", 800.0, Priority::Medium)],
        )
        .unwrap();
    h.planner
        .create_formation(
            "Port Terminal",
            "LP-003",
            Some(3_000.0),
            vec![
                demand("Iron Ore", 300.0, Priority::Low),
                demand("Steel Plates", 300.0, Priority::High),
            ],
        )
        .unwrap();

    let active = h.evaluate_and_publish();
    assert!(active.len() >= 2);
    assert_eq!(active[0].impact, ImpactLevel::Medium);
    assert_eq!(active[0].kind, RecommendationKind::Efficiency);
    for pair in active.windows(2) {
        assert!(pair[0].rank_key() >= pair[1].rank_key());
    }
}

#[test]
fn dismiss_is_idempotent_and_blocks_implement() {
    let h = Harness::new(StaticRateTable::new(30));
    h.registry.register_point("LP-001", "Main Loading Bay 1", "general", 2, 4.0).unwrap();

    h.planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(2_000.0),
            vec![
                demand("Galvanized Sheets", 200.0, Priority::Low),
                demand("Hot Rolled Coils", 1_200.0, Priority::High),
            ],
        )
        .unwrap();

    let active = h.evaluate_and_publish();
    let rec_id = active[0].id.clone();

    h.recommender.dismiss(&rec_id).unwrap();
    h.recommender.dismiss(&rec_id).unwrap();
    assert_eq!(
        h.recommendations.get(&rec_id).unwrap().state,
        RecommendationState::Dismissed
    );

    let err = h.recommender.implement(&rec_id).unwrap_err();
    assert!(matches!(err, EngineError::NotActive { .. }));

    // Dismissed proposals are not resurfaced by later cycles.
    assert!(h.evaluate_and_publish().is_empty());
}
