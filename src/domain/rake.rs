// ==========================================
// Rake Formation DSS - Rake Formation Domain Model
// ==========================================
// Owned exclusively by the Planner. References stock records and
// loading points by identifier only; no embedded copies.
// Invariant: current_load <= capacity and the loaded lines sum to
// current_load.
// ==========================================

use crate::domain::types::{FormationState, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialDemand - an ordered demand line from an order
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDemand {
    pub material_type: String,
    pub quantity_t: f64,
    pub priority: Priority,
}

// ==========================================
// LoadedMaterial - a reserved allocation line
// ==========================================
// `location` pins the stockyard the reservation was taken from so
// dispatch can consume the exact ledger keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedMaterial {
    pub material_type: String,
    pub location: String,
    pub quantity_t: f64,
    pub priority: Priority,
}

// ==========================================
// AllocationShortfall - non-fatal under-allocation record
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationShortfall {
    pub material_type: String,
    pub priority: Priority,
    pub requested_t: f64,
    pub allocated_t: f64,
}

impl AllocationShortfall {
    pub fn missing_t(&self) -> f64 {
        self.requested_t - self.allocated_t
    }
}

// ==========================================
// RakeFormation - a train formation under assembly
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RakeFormation {
    pub formation_id: String,
    pub destination: String,
    /// Current routing choice; defaults to the destination's primary route.
    pub route: String,
    pub loading_point_id: String,

    /// Rake tonnage capacity.
    pub capacity_t: f64,
    /// Sum of loaded lines.
    pub current_load_t: f64,

    /// Ordered demand lines as accepted from the order.
    pub demands: Vec<MaterialDemand>,
    /// Ordered allocation lines written by `allocate`.
    pub materials: Vec<LoadedMaterial>,
    /// Medium/Low (and capacity-capped High) under-allocations.
    pub shortfalls: Vec<AllocationShortfall>,

    pub status: FormationState,
    /// Whether the rake occupies a wagon slot (vs waiting in queue).
    pub holds_slot: bool,

    pub estimated_cost: Option<i64>,
    pub estimated_hours: Option<f64>,

    // ===== Audit fields =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl RakeFormation {
    pub fn new(
        formation_id: impl Into<String>,
        destination: impl Into<String>,
        route: impl Into<String>,
        loading_point_id: impl Into<String>,
        capacity_t: f64,
        demands: Vec<MaterialDemand>,
    ) -> Self {
        let now = Utc::now();
        Self {
            formation_id: formation_id.into(),
            destination: destination.into(),
            route: route.into(),
            loading_point_id: loading_point_id.into(),
            capacity_t,
            current_load_t: 0.0,
            demands,
            materials: Vec::new(),
            shortfalls: Vec::new(),
            status: FormationState::Planning,
            holds_slot: false,
            estimated_cost: None,
            estimated_hours: None,
            created_at: now,
            updated_at: now,
            dispatched_at: None,
        }
    }

    /// Fill fraction `current_load / capacity`; 0.0 for zero capacity.
    pub fn fill_fraction(&self) -> f64 {
        if self.capacity_t > 0.0 {
            self.current_load_t / self.capacity_t
        } else {
            0.0
        }
    }

    /// Total demanded tonnage (used before allocation).
    pub fn demand_total_t(&self) -> f64 {
        self.demands.iter().map(|d| d.quantity_t).sum()
    }

    pub fn has_high_priority_line(&self) -> bool {
        self.demands.iter().any(|d| d.priority == Priority::High)
            || self.materials.iter().any(|m| m.priority == Priority::High)
    }

    /// Invariant check used by store mutations and property tests.
    pub fn invariant_holds(&self) -> bool {
        let line_sum: f64 = self.materials.iter().map(|m| m.quantity_t).sum();
        self.current_load_t <= self.capacity_t + 1e-6 && (line_sum - self.current_load_t).abs() < 1e-6
    }
}
