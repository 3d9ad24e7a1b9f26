// ==========================================
// Rake Formation Planner - lifecycle and allocation tests
// ==========================================

use rake_formation_dss::store::{
    FormationStore, InventoryLedger, LoadingPointRegistry, LockSettings,
};
use rake_formation_dss::{
    ConfigManager, CostTimeEstimator, EngineError, FormationState, MaterialDemand, Priority,
    RakeFormationPlanner, RateTable, StaticRateTable,
};
use std::sync::Arc;

struct Plant {
    ledger: Arc<InventoryLedger>,
    registry: Arc<LoadingPointRegistry>,
    formations: Arc<FormationStore>,
    planner: Arc<RakeFormationPlanner>,
}

fn plant() -> Plant {
    let settings = LockSettings::default();
    let config = Arc::new(ConfigManager::new());
    let rate_table: Arc<dyn RateTable> = Arc::new(StaticRateTable::new(30));

    let ledger = Arc::new(InventoryLedger::new(settings));
    let registry = Arc::new(LoadingPointRegistry::new(settings));
    let formations = Arc::new(FormationStore::new(settings));
    let planner = Arc::new(RakeFormationPlanner::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Arc::clone(&formations),
        CostTimeEstimator::new(rate_table),
        config,
    ));

    Plant {
        ledger,
        registry,
        formations,
        planner,
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
fn full_lifecycle_order_to_dispatch() {
    let plant = plant();
    plant.ledger.define_stock("Hot Rolled Coils", "Stockyard A", 20_000.0).unwrap();
    plant.ledger.receive("Hot Rolled Coils", "Stockyard A", 15_000.0).unwrap();
    plant.ledger.define_stock("Iron Ore", "Stockyard C", 10_000.0).unwrap();
    plant.ledger.receive("Iron Ore", "Stockyard C", 4_000.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 4, 4.2).unwrap();

    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(2_200.0),
            vec![
                demand("Hot Rolled Coils", 2_000.0, Priority::High),
                demand("Iron Ore", 200.0, Priority::Medium),
            ],
        )
        .unwrap();

    let report = plant.planner.allocate(&id).unwrap();
    assert_eq!(report.allocated_t, 2_200.0);
    assert_eq!(report.state, FormationState::Loading);
    assert!(report.shortfalls.is_empty());

    let hrc = plant.ledger.get("Hot Rolled Coils", "Stockyard A").unwrap();
    assert_eq!(hrc.reserved_t, 2_000.0);

    plant.planner.mark_ready(&id).unwrap();
    plant.planner.dispatch(&id).unwrap();

    let formation = plant.formations.get(&id).unwrap();
    assert_eq!(formation.status, FormationState::Dispatched);
    assert!(formation.dispatched_at.is_some());

    // Material left physically and its reservation cleared together.
    let hrc = plant.ledger.get("Hot Rolled Coils", "Stockyard A").unwrap();
    assert_eq!(hrc.current_t, 13_000.0);
    assert_eq!(hrc.reserved_t, 0.0);
    let ore = plant.ledger.get("Iron Ore", "Stockyard C").unwrap();
    assert_eq!(ore.current_t, 3_800.0);
    assert_eq!(ore.reserved_t, 0.0);

    let point = plant.registry.get("LP-001").unwrap();
    assert_eq!(point.active_rakes, 0);
}

#[test]
fn high_priority_fills_before_low_and_is_capacity_capped() {
    let plant = plant();
    plant.ledger.define_stock("Steel Coils", "Stockyard A", 1_000.0).unwrap();
    plant.ledger.receive("Steel Coils", "Stockyard A", 80.0).unwrap();
    plant.ledger.define_stock("Steel Bars", "Stockyard A", 1_000.0).unwrap();
    plant.ledger.receive("Steel Bars", "Stockyard A", 500.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    // High 100 against available=80, capacity=80: High takes all 80,
    // Low gets nothing, and nothing substitutes for the High shortfall.
    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(80.0),
            vec![
                demand("Steel Coils", 100.0, Priority::High),
                demand("Steel Bars", 50.0, Priority::Low),
            ],
        )
        .unwrap();

    let report = plant.planner.allocate(&id).unwrap();
    assert_eq!(report.allocated_t, 80.0);

    let formation = plant.formations.get(&id).unwrap();
    assert_eq!(formation.materials.len(), 1);
    assert_eq!(formation.materials[0].material_type, "Steel Coils");
    assert_eq!(formation.materials[0].quantity_t, 80.0);
    assert_eq!(formation.materials[0].priority, Priority::High);

    assert_eq!(report.shortfalls.len(), 2);
    assert_eq!(report.shortfalls[0].priority, Priority::High);
    assert_eq!(report.shortfalls[0].allocated_t, 80.0);
    assert_eq!(report.shortfalls[1].priority, Priority::Low);
    assert_eq!(report.shortfalls[1].allocated_t, 0.0);
}

#[test]
fn unsatisfiable_high_priority_demand_rolls_everything_back() {
    let plant = plant();
    plant.ledger.define_stock("Steel Plates", "Stockyard B", 1_000.0).unwrap();
    plant.ledger.receive("Steel Plates", "Stockyard B", 50.0).unwrap();
    plant.ledger.define_stock("Steel Pipes", "Stockyard C", 1_000.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![
                demand("Steel Plates", 50.0, Priority::High),
                demand("Steel Pipes", 100.0, Priority::High),
            ],
        )
        .unwrap();

    let err = plant.planner.allocate(&id).unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnsatisfiableHighPriorityDemand { .. }
    ));

    // Pre-call state everywhere: no reservation, no queue entry, still Planning.
    let plates = plant.ledger.get("Steel Plates", "Stockyard B").unwrap();
    assert_eq!(plates.reserved_t, 0.0);
    let formation = plant.formations.get(&id).unwrap();
    assert_eq!(formation.status, FormationState::Planning);
    assert!(formation.materials.is_empty());
    assert_eq!(plant.registry.get("LP-001").unwrap().active_rakes, 0);
}

#[test]
fn equal_priority_ties_follow_declaration_order() {
    let plant = plant();
    plant.ledger.define_stock("Steel Plates", "Stockyard B", 1_000.0).unwrap();
    plant.ledger.receive("Steel Plates", "Stockyard B", 500.0).unwrap();
    plant.ledger.define_stock("Steel Pipes", "Stockyard C", 1_000.0).unwrap();
    plant.ledger.receive("Steel Pipes", "Stockyard C", 500.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(100.0),
            vec![
                demand("Steel Plates", 60.0, Priority::Medium),
                demand("Steel Pipes", 60.0, Priority::Medium),
            ],
        )
        .unwrap();

    let report = plant.planner.allocate(&id).unwrap();
    let formation = plant.formations.get(&id).unwrap();

    assert_eq!(formation.materials[0].material_type, "Steel Plates");
    assert_eq!(formation.materials[0].quantity_t, 60.0);
    assert_eq!(formation.materials[1].material_type, "Steel Pipes");
    assert_eq!(formation.materials[1].quantity_t, 40.0);
    assert_eq!(report.shortfalls.len(), 1);
    assert_eq!(report.shortfalls[0].material_type, "Steel Pipes");
}

#[test]
fn mark_ready_enforces_fill_threshold() {
    let plant = plant();
    plant.ledger.define_stock("Steel Plates", "Stockyard B", 1_000.0).unwrap();
    plant.ledger.receive("Steel Plates", "Stockyard B", 500.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(1_000.0),
            vec![demand("Steel Plates", 500.0, Priority::Medium)],
        )
        .unwrap();
    plant.planner.allocate(&id).unwrap();

    let err = plant.planner.mark_ready(&id).unwrap_err();
    assert!(matches!(err, EngineError::NotReady { .. }));
    assert_eq!(plant.formations.get(&id).unwrap().status, FormationState::Loading);
}

#[test]
fn lifecycle_is_strictly_forward() {
    let plant = plant();
    plant.ledger.define_stock("Steel Plates", "Stockyard B", 1_000.0).unwrap();
    plant.ledger.receive("Steel Plates", "Stockyard B", 500.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![demand("Steel Plates", 500.0, Priority::High)],
        )
        .unwrap();

    // Dispatch straight from Planning: refused.
    let err = plant.planner.dispatch(&id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidStateTransition { .. }));

    plant.planner.allocate(&id).unwrap();

    // A second allocate cannot rewind Loading.
    let err = plant.planner.allocate(&id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidStateTransition { .. }));

    plant.planner.mark_ready(&id).unwrap();
    plant.planner.dispatch(&id).unwrap();

    // Terminal: no further transitions.
    let err = plant.planner.dispatch(&id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
}

#[test]
fn cancel_restores_ledger_and_registry() {
    let plant = plant();
    plant.ledger.define_stock("Steel Plates", "Stockyard B", 1_000.0).unwrap();
    plant.ledger.receive("Steel Plates", "Stockyard B", 500.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    let id = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![demand("Steel Plates", 400.0, Priority::High)],
        )
        .unwrap();
    plant.planner.allocate(&id).unwrap();

    plant.planner.cancel(&id).unwrap();

    assert!(!plant.formations.contains(&id));
    let plates = plant.ledger.get("Steel Plates", "Stockyard B").unwrap();
    assert_eq!(plates.reserved_t, 0.0);
    assert_eq!(plates.current_t, 500.0);
    assert_eq!(plant.registry.get("LP-001").unwrap().active_rakes, 0);
}

#[test]
fn dispatch_promotes_the_queued_rake() {
    let plant = plant();
    plant.ledger.define_stock("Steel Plates", "Stockyard B", 5_000.0).unwrap();
    plant.ledger.receive("Steel Plates", "Stockyard B", 2_000.0).unwrap();
    plant.registry.register_point("LP-001", "Main Loading Bay 1", "general", 1, 4.0).unwrap();

    let first = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![demand("Steel Plates", 500.0, Priority::High)],
        )
        .unwrap();
    let second = plant
        .planner
        .create_formation(
            "Customer Site B",
            "LP-001",
            Some(500.0),
            vec![demand("Steel Plates", 500.0, Priority::High)],
        )
        .unwrap();

    plant.planner.allocate(&first).unwrap();
    let report = plant.planner.allocate(&second).unwrap();
    assert_eq!(report.queue_position, 1);
    assert!(!plant.formations.get(&second).unwrap().holds_slot);

    plant.planner.mark_ready(&first).unwrap();
    plant.planner.dispatch(&first).unwrap();

    let promoted = plant.formations.get(&second).unwrap();
    assert!(promoted.holds_slot);
    let point = plant.registry.get("LP-001").unwrap();
    assert_eq!(point.active_rakes, 1);
    assert_eq!(point.queue_length(), 0);
}
