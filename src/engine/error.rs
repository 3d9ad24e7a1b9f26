// ==========================================
// Rake Formation DSS - Engine Layer Error Types
// ==========================================
// Business-rule errors raised by the planner and the recommendation
// engine. Store errors pass through and are classified at the API
// boundary. Tool: thiserror derive macro.
// ==========================================

use crate::domain::types::FormationState;
use crate::store::error::StoreError;
use thiserror::Error;

/// Engine layer error type.
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== Allocation errors =====
    /// Hard stop: a High-priority demand could not be filled at all.
    /// Partial fills of critical cargo are never silently dropped.
    #[error("unsatisfiable high priority demand: formation={formation_id} material={material_type} requested={requested_t}t")]
    UnsatisfiableHighPriorityDemand {
        formation_id: String,
        material_type: String,
        requested_t: f64,
    },

    // ===== Lifecycle errors =====
    #[error("invalid state transition: formation={formation_id} from={from} to={to}")]
    InvalidStateTransition {
        formation_id: String,
        from: FormationState,
        to: FormationState,
    },

    #[error("formation not ready: formation={formation_id} fill={fill_pct:.1}% threshold={threshold_pct:.1}%")]
    NotReady {
        formation_id: String,
        fill_pct: f64,
        threshold_pct: f64,
    },

    #[error("business rule violation: {0}")]
    BusinessRuleViolation(String),

    // ===== Recommendation errors =====
    /// The recommendation's mutation partially applied and was rolled
    /// back; the recommendation stays active for retry.
    #[error("recommendation implementation failed: id={id}: {reason}")]
    ImplementationFailed { id: String, reason: String },

    #[error("recommendation not active: id={id} state={state}")]
    NotActive { id: String, state: String },

    // ===== Pass-through =====
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias.
pub type EngineResult<T> = Result<T, EngineError>;
