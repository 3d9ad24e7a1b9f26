// ==========================================
// End-to-end flow through the command/query API
// ==========================================

use rake_formation_dss::api::{MaterialDemandRequest, OrderIntake, StockEvent, StockEventKind};
use rake_formation_dss::store::{
    FormationStore, InventoryLedger, LoadingPointRegistry, LockSettings, RecommendationStore,
};
use rake_formation_dss::{
    ApiError, CommandApi, ConfigManager, CostTimeEstimator, FormationState, OperationalState,
    Priority, QueryApi, RakeFormationPlanner, RateTable, RecommendationEngine, StaticAccuracy,
    StaticRateTable, StockStatus,
};
use std::sync::Arc;

fn apis() -> (CommandApi, QueryApi) {
    let settings = LockSettings::default();
    let config = Arc::new(ConfigManager::new());
    let rate_table: Arc<dyn RateTable> = Arc::new(StaticRateTable::new(35));

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

    let commands = CommandApi::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Arc::clone(&planner),
        recommender,
    );
    let queries = QueryApi::new(ledger, registry, formations, recommendations, config);
    (commands, queries)
}

fn seed_plant(commands: &CommandApi) {
    commands.define_stock("Hot Rolled Coils", "Stockyard A", 20_000.0).unwrap();
    commands.define_stock("Iron Ore", "Stockyard C", 10_000.0).unwrap();
    commands
        .apply_stock_event(StockEvent {
            material_type: "Hot Rolled Coils".to_string(),
            location: "Stockyard A".to_string(),
            delta_t: 15_000.0,
            kind: StockEventKind::Receipt,
        })
        .unwrap();
    commands
        .apply_stock_event(StockEvent {
            material_type: "Iron Ore".to_string(),
            location: "Stockyard C".to_string(),
            delta_t: 4_000.0,
            kind: StockEventKind::Receipt,
        })
        .unwrap();
    commands.register_loading_point("LP-001", "Main Loading Bay 1", "general", 4, 4.2).unwrap();
    commands.register_loading_point("LP-002", "Express Loading Bay", "express", 2, 3.8).unwrap();
}

fn order(destination: &str, preference: Option<&str>) -> OrderIntake {
    OrderIntake {
        destination: destination.to_string(),
        loading_point_preference: preference.map(str::to_string),
        material_demands: vec![
            MaterialDemandRequest {
                material_type: "Hot Rolled Coils".to_string(),
                quantity_t: 2_000.0,
                priority: Priority::High,
            },
            MaterialDemandRequest {
                material_type: "Iron Ore".to_string(),
                quantity_t: 200.0,
                priority: Priority::Medium,
            },
        ],
        capacity_t: Some(2_200.0),
    }
}

#[test]
fn order_to_dispatch_updates_every_query_surface() {
    let (commands, queries) = apis();
    seed_plant(&commands);

    let rake_id = commands.submit_order(order("Customer Site B", Some("LP-001"))).unwrap();

    let view = queries.formation(&rake_id).unwrap();
    assert_eq!(view.status, FormationState::Planning);
    assert_eq!(view.current_load_t, 0.0);

    let report = commands.optimize(&rake_id).unwrap();
    assert_eq!(report.allocated_t, 2_200.0);

    let view = queries.formation(&rake_id).unwrap();
    assert_eq!(view.status, FormationState::Loading);
    assert_eq!(view.current_load_t, 2_200.0);
    assert!(view.estimated_cost.is_some());
    assert!(view.estimated_hours.is_some());

    let points = queries.loading_points().unwrap();
    let lp1 = points.iter().find(|p| p.point_id == "LP-001").unwrap();
    assert_eq!(lp1.active_rakes, 1);
    assert_eq!(lp1.status, OperationalState::Busy);

    commands.mark_ready(&rake_id).unwrap();
    commands.dispatch(&rake_id).unwrap();

    let metrics = queries.dashboard_metrics().unwrap();
    assert_eq!(metrics.total_rakes, 1);
    assert_eq!(metrics.active_rakes, 0);
    assert_eq!(metrics.completed_today, 1);

    let stocks = queries.material_stocks().unwrap();
    let hrc = stocks
        .iter()
        .find(|s| s.material_type == "Hot Rolled Coils")
        .unwrap();
    assert_eq!(hrc.current_t, 13_000.0);
    assert_eq!(hrc.reserved_t, 0.0);
    assert_eq!(hrc.status, StockStatus::Adequate);
}

#[test]
fn order_without_preference_takes_least_utilized_point() {
    let (commands, queries) = apis();
    seed_plant(&commands);

    // Load LP-001 a little so LP-002 wins the tie on utilization.
    let first = commands.submit_order(order("Customer Site B", Some("LP-001"))).unwrap();
    commands.optimize(&first).unwrap();

    let second = commands.submit_order(order("Customer Site B", None)).unwrap();
    let view = queries.formation(&second).unwrap();
    assert_eq!(view.loading_point, "LP-002");
}

#[test]
fn preference_for_offline_point_is_refused() {
    let (commands, _queries) = apis();
    seed_plant(&commands);
    commands.set_loading_point_state("LP-002", OperationalState::Offline).unwrap();

    let err = commands
        .submit_order(order("Customer Site B", Some("LP-002")))
        .unwrap_err();
    assert!(matches!(err, ApiError::ConstraintViolation(_)));
}

#[test]
fn validation_rejects_before_any_mutation() {
    let (commands, queries) = apis();
    seed_plant(&commands);

    let err = commands
        .submit_order(OrderIntake {
            destination: "".to_string(),
            loading_point_preference: None,
            material_demands: vec![],
            capacity_t: None,
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = commands
        .apply_stock_event(StockEvent {
            material_type: "Hot Rolled Coils".to_string(),
            location: "Stockyard A".to_string(),
            delta_t: -100.0,
            kind: StockEventKind::Receipt,
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // Nothing changed.
    assert!(queries.rake_formations().unwrap().is_empty());
    let hrc = queries.stock_status("Hot Rolled Coils", "Stockyard A").unwrap();
    assert_eq!(hrc, StockStatus::Adequate);
}

#[test]
fn receipt_overflow_is_reported_not_clipped() {
    let (commands, queries) = apis();
    seed_plant(&commands);

    let err = commands
        .apply_stock_event(StockEvent {
            material_type: "Hot Rolled Coils".to_string(),
            location: "Stockyard A".to_string(),
            delta_t: 6_000.0,
            kind: StockEventKind::Receipt,
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::ConstraintViolation(_)));

    let stocks = queries.material_stocks().unwrap();
    let hrc = stocks
        .iter()
        .find(|s| s.material_type == "Hot Rolled Coils")
        .unwrap();
    assert_eq!(hrc.current_t, 15_000.0);
}

#[test]
fn negative_adjustment_shrinks_stock() {
    let (commands, queries) = apis();
    seed_plant(&commands);

    commands
        .apply_stock_event(StockEvent {
            material_type: "Iron Ore".to_string(),
            location: "Stockyard C".to_string(),
            delta_t: -1_500.0,
            kind: StockEventKind::Adjustment,
        })
        .unwrap();

    let stocks = queries.material_stocks().unwrap();
    let ore = stocks.iter().find(|s| s.material_type == "Iron Ore").unwrap();
    assert_eq!(ore.current_t, 2_500.0);
}

#[test]
fn unknown_ids_report_not_found() {
    let (commands, queries) = apis();
    seed_plant(&commands);

    assert!(matches!(
        commands.dispatch("RK-missing").unwrap_err(),
        ApiError::NotFound(_)
    ));
    assert!(matches!(
        commands.implement_recommendation("rec-missing").unwrap_err(),
        ApiError::NotFound(_)
    ));
    assert!(matches!(
        queries.formation("RK-missing").unwrap_err(),
        ApiError::NotFound(_)
    ));
    assert!(matches!(
        queries.stock_status("Slag", "Nowhere").unwrap_err(),
        ApiError::NotFound(_)
    ));
}
