// ==========================================
// Rake Formation DSS - Domain Layer
// ==========================================
// Entities and tagged state enums. No business rules here; the
// engine layer owns the rules, the store layer owns the records.
// ==========================================

pub mod loading_point;
pub mod material;
pub mod rake;
pub mod recommendation;
pub mod types;

pub use loading_point::LoadingPoint;
pub use material::{MaterialStock, StockKey};
pub use rake::{AllocationShortfall, LoadedMaterial, MaterialDemand, RakeFormation};
pub use recommendation::{Recommendation, RecommendationTarget, RecommendedAction};
pub use types::{
    DistanceTier, FormationState, ImpactLevel, OperationalState, Priority, RecommendationKind,
    RecommendationState, StockStatus,
};
