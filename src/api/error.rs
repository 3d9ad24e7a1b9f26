// ==========================================
// Rake Formation DSS - API Layer Error Types
// ==========================================
// The taxonomy external callers see. Lower-layer errors are caught
// and classified here; nothing crosses the boundary unclassified.
// ==========================================

use crate::engine::error::EngineError;
use crate::store::error::StoreError;
use thiserror::Error;

/// API layer error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or out-of-range input, rejected before any mutation.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// A business rule refused the operation; no store was mutated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Lock contention survived the bounded internal retries.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// A recommendation's mutation partially applied and was rolled
    /// back; the recommendation stays active for retry.
    #[error("implementation failed: {0}")]
    ImplementationFailed(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

// ==========================================
// Classification from the store layer
// ==========================================
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),

            StoreError::Duplicate { .. }
            | StoreError::CapacityExceeded { .. }
            | StoreError::InsufficientAvailable { .. }
            | StoreError::InvalidRelease { .. }
            | StoreError::InsufficientReserved { .. }
            | StoreError::InvalidAdjustment { .. }
            | StoreError::ActiveRakesPresent { .. }
            | StoreError::PointUnavailable { .. }
            | StoreError::InvalidStateTransition { .. } => {
                ApiError::ConstraintViolation(err.to_string())
            }

            StoreError::LockContention { .. } | StoreError::LockPoisoned(_) => {
                ApiError::ConcurrencyConflict(err.to_string())
            }

            StoreError::Other(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

// ==========================================
// Classification from the engine layer
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnsatisfiableHighPriorityDemand { .. }
            | EngineError::InvalidStateTransition { .. }
            | EngineError::NotReady { .. }
            | EngineError::BusinessRuleViolation(_)
            | EngineError::NotActive { .. } => ApiError::ConstraintViolation(err.to_string()),

            EngineError::ImplementationFailed { .. } => {
                ApiError::ImplementationFailed(err.to_string())
            }

            EngineError::Store(store_err) => store_err.into(),
        }
    }
}

/// Result type alias.
pub type ApiResult<T> = Result<T, ApiError>;
