// ==========================================
// Rake Formation DSS - Core Library
// ==========================================
// Decision support engine for rake formation at a steel plant:
// inventory allocation, loading point scheduling, stock health
// derivation and ranked optimization recommendations.
// The presentation layer consumes the api module only.
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities and state types
pub mod domain;

// Store layer - per-key locked entity stores
pub mod store;

// Engine layer - business rules
pub mod engine;

// Service layer - periodic evaluation
pub mod service;

// Configuration layer
pub mod config;

// API layer - command/query boundary
pub mod api;

// Logging
pub mod logging;

// ==========================================
// Re-exports of core types
// ==========================================

// Domain types
pub use domain::types::{
    DistanceTier, FormationState, ImpactLevel, OperationalState, Priority, RecommendationKind,
    RecommendationState, StockStatus,
};

// Domain entities
pub use domain::{
    AllocationShortfall, LoadedMaterial, LoadingPoint, MaterialDemand, MaterialStock,
    RakeFormation, Recommendation, RecommendationTarget, RecommendedAction, StockKey,
};

// Stores
pub use store::{
    EnqueueOutcome, FormationStore, InventoryLedger, LoadingPointRegistry, RecommendationStore,
    StoreError,
};

// Engines
pub use engine::{
    AllocationReport, CostTimeEstimator, EngineError, EngineSnapshots, RakeFormationPlanner,
    RateTable, RecommendationEngine, RouteOption, StaticAccuracy, StaticRateTable,
    StockStatusDeriver,
};

// Services
pub use service::{EvaluationHandle, EvaluationService, StoreSink};

// API
pub use api::{ApiError, CommandApi, OrderIntake, QueryApi, StockEvent, StockEventKind};

// Configuration
pub use config::{ConfigManager, EngineConfig, StatusBands};

// ==========================================
// Constants
// ==========================================

// System version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// System name
pub const APP_NAME: &str = "Rake Formation DSS";
