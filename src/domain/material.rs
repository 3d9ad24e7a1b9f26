// ==========================================
// Rake Formation DSS - Material Stock Domain Model
// ==========================================
// Owned exclusively by the Inventory Ledger.
// Invariant: 0 <= reserved <= current <= capacity.
// Records live for the lifetime of the (type, location) pair;
// they are zeroed, never deleted.
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// StockKey - ledger map key
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub material_type: String,
    pub location: String,
}

impl StockKey {
    pub fn new(material_type: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            material_type: material_type.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.material_type, self.location)
    }
}

// ==========================================
// MaterialStock - per type/location stock record
// ==========================================
// Quantities are tonnes. Status is derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialStock {
    pub material_type: String,
    pub location: String,

    /// Physically present quantity (tonnes).
    pub current_t: f64,
    /// Storage capacity of the stockyard slot (tonnes).
    pub capacity_t: f64,
    /// Quantity reserved for formations (tonnes).
    pub reserved_t: f64,

    // ===== Audit fields =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialStock {
    pub fn new(material_type: impl Into<String>, location: impl Into<String>, capacity_t: f64) -> Self {
        let now = Utc::now();
        Self {
            material_type: material_type.into(),
            location: location.into(),
            current_t: 0.0,
            capacity_t,
            reserved_t: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.material_type.clone(), self.location.clone())
    }

    /// Unreserved quantity callers may still claim.
    pub fn available_t(&self) -> f64 {
        self.current_t - self.reserved_t
    }

    /// Fill fraction `current / capacity`; 0.0 for a zero-capacity record.
    pub fn utilization(&self) -> f64 {
        if self.capacity_t > 0.0 {
            self.current_t / self.capacity_t
        } else {
            0.0
        }
    }

    /// Invariant check used by store mutations and property tests.
    pub fn invariant_holds(&self) -> bool {
        0.0 <= self.reserved_t
            && self.reserved_t <= self.current_t
            && self.current_t <= self.capacity_t
    }
}
