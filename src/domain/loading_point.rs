// ==========================================
// Rake Formation DSS - Loading Point Domain Model
// ==========================================
// Owned exclusively by the Loading Point Registry.
// Invariant: 0 <= active_rakes <= capacity_slots, and a non-empty
// queue implies every slot is taken.
// Created at plant configuration time; never destroyed while the
// plant is live.
// ==========================================

use crate::domain::types::OperationalState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ==========================================
// LoadingPoint - a physical loading bay
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingPoint {
    pub point_id: String,
    pub name: String,
    /// Peer grouping for reassignment (points of the same class are
    /// interchangeable for queued rakes).
    pub class_code: String,

    /// Concurrent wagon slots.
    pub capacity_slots: u32,
    /// Rakes currently occupying a slot.
    pub active_rakes: u32,
    /// FIFO wait queue of rake ids.
    pub queue: VecDeque<String>,

    /// Stored operator state; `Busy` is derived, see `effective_state`.
    pub state: OperationalState,

    /// Historical average time to load one rake (hours).
    pub avg_loading_hours: f64,

    // ===== Audit fields =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoadingPoint {
    pub fn new(
        point_id: impl Into<String>,
        name: impl Into<String>,
        class_code: impl Into<String>,
        capacity_slots: u32,
        avg_loading_hours: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            point_id: point_id.into(),
            name: name.into(),
            class_code: class_code.into(),
            capacity_slots,
            active_rakes: 0,
            queue: VecDeque::new(),
            state: OperationalState::Available,
            avg_loading_hours,
            created_at: now,
            updated_at: now,
        }
    }

    /// Operator overrides win; otherwise Available/Busy follows the
    /// active rake count.
    pub fn effective_state(&self) -> OperationalState {
        if self.state.is_override() {
            self.state
        } else if self.active_rakes > 0 {
            OperationalState::Busy
        } else {
            OperationalState::Available
        }
    }

    pub fn has_free_slot(&self) -> bool {
        self.active_rakes < self.capacity_slots
    }

    /// Slot utilization as a 0-100 percentage.
    pub fn utilization_pct(&self) -> f64 {
        if self.capacity_slots > 0 {
            (self.active_rakes as f64 / self.capacity_slots as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Zero-based position of a rake in the wait queue.
    pub fn queue_position(&self, rake_id: &str) -> Option<usize> {
        self.queue.iter().position(|r| r == rake_id)
    }

    /// Invariant check used by store mutations and property tests.
    pub fn invariant_holds(&self) -> bool {
        self.active_rakes <= self.capacity_slots
            && (self.queue.is_empty() || self.active_rakes == self.capacity_slots)
    }
}
