// ==========================================
// Rake Formation DSS - Engine Layer
// ==========================================
// Business rules over the stores. Engines output explainable
// results; the stores never embed rules, the rules never own
// records.
// ==========================================

pub mod error;
pub mod estimator;
pub mod events;
pub mod planner;
pub mod recommender;
pub mod status;

pub use error::{EngineError, EngineResult};
pub use estimator::{CostTimeEstimator, RateTable, RouteOption, StaticRateTable};
pub use events::{
    EngineEvent, EngineEventPublisher, EngineEventType, NoOpEventPublisher, OptionalEventPublisher,
};
pub use planner::{AllocationReport, RakeFormationPlanner};
pub use recommender::{AccuracyProvider, EngineSnapshots, RecommendationEngine, StaticAccuracy};
pub use status::StockStatusDeriver;
