// ==========================================
// Rake Formation DSS - Scenario Driver
// ==========================================
// Seeds a small plant, runs an order -> allocate -> ready ->
// dispatch cycle plus one recommendation evaluation pass, and logs
// the resulting dashboard snapshot. Exercises the full command and
// query surface without any UI.
// ==========================================

use rake_formation_dss::api::{MaterialDemandRequest, OrderIntake, StockEvent, StockEventKind};
use rake_formation_dss::engine::estimator::RouteOption;
use rake_formation_dss::logging;
use rake_formation_dss::service::StoreSink;
use rake_formation_dss::store::{
    FormationStore, InventoryLedger, LoadingPointRegistry, LockSettings, RecommendationStore,
};
use rake_formation_dss::{
    CommandApi, ConfigManager, CostTimeEstimator, DistanceTier, EvaluationService, Priority,
    QueryApi, RakeFormationPlanner, RateTable, RecommendationEngine, StaticAccuracy,
    StaticRateTable,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", rake_formation_dss::APP_NAME, rake_formation_dss::VERSION);
    tracing::info!("==================================================");

    let config = Arc::new(ConfigManager::new());
    let lock_settings = {
        let c = config.current();
        LockSettings {
            attempts: c.lock_retry_attempts,
            backoff_ms: c.lock_retry_backoff_ms,
        }
    };

    let rate_table: Arc<dyn RateTable> = Arc::new(
        StaticRateTable::new(35)
            .with_tier("CMO Stockyard A", DistanceTier::Regional)
            .with_tier("Customer Site B", DistanceTier::National)
            .with_tier("Port Terminal", DistanceTier::National)
            .with_rate(DistanceTier::Regional, "Hot Rolled Coils", 38)
            .with_rate(DistanceTier::National, "Hot Rolled Coils", 52)
            .with_rate(DistanceTier::National, "Iron Ore", 24)
            .with_routes(
                "CMO Stockyard A",
                vec![
                    RouteOption { route: "cmo-main".to_string(), base_hours: 6.0 },
                    RouteOption { route: "cmo-bypass".to_string(), base_hours: 7.5 },
                ],
            )
            .with_congestion("cmo-main", 1.6),
    );

    let ledger = Arc::new(InventoryLedger::new(lock_settings));
    let registry = Arc::new(LoadingPointRegistry::new(lock_settings));
    let formations = Arc::new(FormationStore::new(lock_settings));
    let recommendations = Arc::new(RecommendationStore::new(lock_settings));

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
        Arc::clone(&rate_table),
        Arc::new(StaticAccuracy),
    ));

    let commands = CommandApi::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Arc::clone(&planner),
        Arc::clone(&recommender),
    );
    let queries = QueryApi::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Arc::clone(&formations),
        Arc::clone(&recommendations),
        Arc::clone(&config),
    );

    // ==========================================
    // Plant configuration
    // ==========================================

    commands.define_stock("Hot Rolled Coils", "Stockyard A", 20_000.0)?;
    commands.define_stock("Cold Rolled Sheets", "Stockyard B", 12_000.0)?;
    commands.define_stock("Steel Pipes", "Stockyard C", 5_000.0)?;
    commands.define_stock("Galvanized Sheets", "Stockyard A", 8_000.0)?;
    commands.define_stock("Iron Ore", "Stockyard C", 10_000.0)?;

    for (material_type, location, delta_t) in [
        ("Hot Rolled Coils", "Stockyard A", 15_000.0),
        ("Cold Rolled Sheets", "Stockyard B", 2_500.0),
        ("Steel Pipes", "Stockyard C", 800.0),
        ("Galvanized Sheets", "Stockyard A", 7_500.0),
        ("Iron Ore", "Stockyard C", 4_000.0),
    ] {
        commands.apply_stock_event(StockEvent {
            material_type: material_type.to_string(),
            location: location.to_string(),
            delta_t,
            kind: StockEventKind::Receipt,
        })?;
    }

    commands.register_loading_point("LP-001", "Main Loading Bay 1", "general", 4, 4.2)?;
    commands.register_loading_point("LP-002", "Express Loading Bay", "express", 2, 3.8)?;
    commands.register_loading_point("LP-003", "Heavy Material Bay", "heavy", 3, 5.1)?;

    // ==========================================
    // Order intake and rake lifecycle
    // ==========================================

    let rake_a = commands.submit_order(OrderIntake {
        destination: "CMO Stockyard A".to_string(),
        loading_point_preference: Some("LP-001".to_string()),
        material_demands: vec![
            MaterialDemandRequest {
                material_type: "Hot Rolled Coils".to_string(),
                quantity_t: 1_200.0,
                priority: Priority::High,
            },
            MaterialDemandRequest {
                material_type: "Cold Rolled Sheets".to_string(),
                quantity_t: 800.0,
                priority: Priority::Medium,
            },
            MaterialDemandRequest {
                material_type: "Galvanized Sheets".to_string(),
                quantity_t: 200.0,
                priority: Priority::Low,
            },
        ],
        capacity_t: Some(2_500.0),
    })?;

    let rake_b = commands.submit_order(OrderIntake {
        destination: "Customer Site B".to_string(),
        loading_point_preference: Some("LP-002".to_string()),
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
    })?;

    // Two deliberately under-filled port orders (merge candidates)
    // and one with a priority-inverted demand list (reorder candidate).
    let _rake_c = commands.submit_order(OrderIntake {
        destination: "Port Terminal".to_string(),
        loading_point_preference: Some("LP-003".to_string()),
        material_demands: vec![MaterialDemandRequest {
            material_type: "Iron Ore".to_string(),
            quantity_t: 800.0,
            priority: Priority::Medium,
        }],
        capacity_t: Some(3_000.0),
    })?;
    let _rake_d = commands.submit_order(OrderIntake {
        destination: "Port Terminal".to_string(),
        loading_point_preference: Some("LP-003".to_string()),
        material_demands: vec![MaterialDemandRequest {
            material_type: "Iron Ore".to_string(),
            quantity_t: 600.0,
            priority: Priority::Low,
        }],
        capacity_t: Some(3_000.0),
    })?;

    let report_a = commands.optimize(&rake_a)?;
    tracing::info!(
        rake_id = %rake_a,
        allocated_t = report_a.allocated_t,
        shortfalls = report_a.shortfalls.len(),
        "rake A allocated"
    );

    commands.optimize(&rake_b)?;
    commands.mark_ready(&rake_b)?;
    commands.dispatch(&rake_b)?;
    tracing::info!(rake_id = %rake_b, "rake B dispatched");

    // ==========================================
    // Recommendation evaluation pass
    // ==========================================

    let evaluation = Arc::new(EvaluationService::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Arc::clone(&formations),
        Arc::clone(&recommender),
        Arc::clone(&config),
        Arc::new(StoreSink::new(Arc::clone(&recommendations))),
    ));
    let report = evaluation.evaluate_once().await?;
    tracing::info!(
        candidates = report.candidates,
        published = report.published,
        "evaluation pass done"
    );

    let active = queries.recommendations()?;
    for rec in &active {
        tracing::info!(
            id = %rec.id,
            kind = %rec.kind,
            impact = %rec.impact,
            confidence = rec.confidence,
            savings = rec.potential_savings.unwrap_or(0),
            "recommendation: {}",
            rec.title
        );
    }

    if let Some(top) = active.first() {
        commands.implement_recommendation(&top.id)?;
        tracing::info!(id = %top.id, "top recommendation implemented");
    }
    if let Some(next) = active.get(1) {
        commands.dismiss_recommendation(&next.id)?;
        tracing::info!(id = %next.id, "second recommendation dismissed");
    }

    // ==========================================
    // Dashboard snapshot
    // ==========================================

    let metrics = queries.dashboard_metrics()?;
    tracing::info!("metrics: {}", serde_json::to_string_pretty(&metrics)?);
    tracing::info!("stocks: {}", serde_json::to_string_pretty(&queries.material_stocks()?)?);
    tracing::info!(
        "loading points: {}",
        serde_json::to_string_pretty(&queries.loading_points()?)?
    );
    tracing::info!(
        "formations: {}",
        serde_json::to_string_pretty(&queries.rake_formations()?)?
    );

    Ok(())
}
