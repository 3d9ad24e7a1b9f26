// ==========================================
// Rake Formation DSS - API Layer
// ==========================================
// The boundary the presentation layer and external feeds consume:
// a command surface, a read-only query surface, and the error
// taxonomy both report through.
// ==========================================

pub mod command_api;
pub mod error;
pub mod query_api;
pub mod validator;

pub use command_api::{
    CommandApi, MaterialDemandRequest, OrderIntake, StockEvent, StockEventKind,
};
pub use error::{ApiError, ApiResult};
pub use query_api::{
    DashboardMetrics, LoadingPointView, MaterialStockView, QueryApi, RakeFormationView,
    RakeMaterialView, RecommendationView,
};
