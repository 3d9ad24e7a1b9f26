// ==========================================
// Rake Formation DSS - Store Layer Error Types
// ==========================================
// Business-rule breaches are reported to the caller, never silently
// clamped. Tool: thiserror derive macro.
// ==========================================

use thiserror::Error;

/// Store layer error type.
#[derive(Error, Debug)]
pub enum StoreError {
    // ===== Lookup errors =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("duplicate record: {entity} with id={id}")]
    Duplicate { entity: String, id: String },

    // ===== Inventory constraint violations =====
    #[error("capacity exceeded: {material_type}@{location} current={current_t}t capacity={capacity_t}t receipt={delta_t}t")]
    CapacityExceeded {
        material_type: String,
        location: String,
        current_t: f64,
        capacity_t: f64,
        delta_t: f64,
    },

    #[error("insufficient available stock: {material_type}@{location} requested={requested_t}t available={available_t}t")]
    InsufficientAvailable {
        material_type: String,
        location: String,
        requested_t: f64,
        available_t: f64,
    },

    #[error("invalid release: {material_type}@{location} requested={requested_t}t reserved={reserved_t}t")]
    InvalidRelease {
        material_type: String,
        location: String,
        requested_t: f64,
        reserved_t: f64,
    },

    #[error("insufficient reserved stock: {material_type}@{location} requested={requested_t}t reserved={reserved_t}t")]
    InsufficientReserved {
        material_type: String,
        location: String,
        requested_t: f64,
        reserved_t: f64,
    },

    #[error("invalid adjustment: {material_type}@{location} delta={delta_t}t: {reason}")]
    InvalidAdjustment {
        material_type: String,
        location: String,
        delta_t: f64,
        reason: String,
    },

    // ===== Loading point constraint violations =====
    #[error("active rakes present: point={point_id} active={active}, drain before state change")]
    ActiveRakesPresent { point_id: String, active: u32 },

    #[error("loading point unavailable: point={point_id} state={state}")]
    PointUnavailable { point_id: String, state: String },

    #[error("invalid state transition: {entity} {id}: from={from} to={to}")]
    InvalidStateTransition {
        entity: String,
        id: String,
        from: String,
        to: String,
    },

    // ===== Concurrency errors =====
    #[error("lock contention: {resource} still held after {attempts} attempts")]
    LockContention { resource: String, attempts: u32 },

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    // ===== Generic errors =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias.
pub type StoreResult<T> = Result<T, StoreError>;
