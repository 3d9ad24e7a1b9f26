// ==========================================
// Rake Formation DSS - Loading Point Registry
// ==========================================
// Exclusively owns LoadingPoint records and their FIFO wait queues.
// Slot grants and promotions happen under the point's record lock,
// so the active count can never overshoot the slot capacity.
// ==========================================

use crate::domain::loading_point::LoadingPoint;
use crate::domain::types::OperationalState;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{lock_with_retry, LockSettings};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

// ==========================================
// EnqueueOutcome
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnqueueOutcome {
    /// A wagon slot was free; the rake starts loading immediately.
    SlotGranted,
    /// All slots taken; the rake waits at this zero-based queue position.
    Queued { position: usize },
}

// ==========================================
// PointStatus - query projection
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointStatus {
    pub state: OperationalState,
    pub utilization_pct: f64,
    pub queue_length: usize,
}

// ==========================================
// LoadingPointRegistry
// ==========================================
pub struct LoadingPointRegistry {
    points: RwLock<HashMap<String, Arc<Mutex<LoadingPoint>>>>,
    lock_settings: LockSettings,
}

impl LoadingPointRegistry {
    pub fn new(lock_settings: LockSettings) -> Self {
        Self {
            points: RwLock::new(HashMap::new()),
            lock_settings,
        }
    }

    // ==========================================
    // Plant configuration
    // ==========================================

    pub fn register_point(
        &self,
        point_id: &str,
        name: &str,
        class_code: &str,
        capacity_slots: u32,
        avg_loading_hours: f64,
    ) -> StoreResult<()> {
        let mut map = self
            .points
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if map.contains_key(point_id) {
            return Err(StoreError::Duplicate {
                entity: "LoadingPoint".to_string(),
                id: point_id.to_string(),
            });
        }

        map.insert(
            point_id.to_string(),
            Arc::new(Mutex::new(LoadingPoint::new(
                point_id,
                name,
                class_code,
                capacity_slots,
                avg_loading_hours,
            ))),
        );
        tracing::info!(point_id, capacity_slots, "loading point registered");
        Ok(())
    }

    // ==========================================
    // Mutations
    // ==========================================

    /// Grant a slot if one is free, otherwise append to the FIFO
    /// wait queue. Points under Maintenance/Offline accept nothing.
    pub fn enqueue(&self, point_id: &str, rake_id: &str) -> StoreResult<EnqueueOutcome> {
        self.with_point(point_id, |point| {
            if point.state.is_override() {
                return Err(StoreError::PointUnavailable {
                    point_id: point.point_id.clone(),
                    state: point.state.to_string(),
                });
            }

            if point.has_free_slot() {
                point.active_rakes += 1;
                tracing::info!(point_id = %point.point_id, rake_id, "slot granted");
                Ok(EnqueueOutcome::SlotGranted)
            } else {
                point.queue.push_back(rake_id.to_string());
                let position = point.queue.len() - 1;
                tracing::info!(point_id = %point.point_id, rake_id, position, "rake queued");
                Ok(EnqueueOutcome::Queued { position })
            }
        })
    }

    /// Free one slot and promote the queue head if any, preserving
    /// FIFO order. No-op when no slot is occupied.
    pub fn release_slot(&self, point_id: &str) -> StoreResult<Option<String>> {
        self.with_point(point_id, |point| {
            if point.active_rakes == 0 {
                return Ok(None);
            }

            point.active_rakes -= 1;
            if let Some(promoted) = point.queue.pop_front() {
                point.active_rakes += 1;
                tracing::info!(point_id = %point.point_id, rake_id = %promoted, "queued rake promoted");
                Ok(Some(promoted))
            } else {
                Ok(None)
            }
        })
    }

    /// Operator state transition. Busy is derived and cannot be set;
    /// entering an override state requires the point to be drained.
    pub fn set_state(&self, point_id: &str, state: OperationalState) -> StoreResult<()> {
        self.with_point(point_id, |point| {
            if state == OperationalState::Busy {
                return Err(StoreError::InvalidStateTransition {
                    entity: "LoadingPoint".to_string(),
                    id: point.point_id.clone(),
                    from: point.state.to_string(),
                    to: state.to_string(),
                });
            }

            if state.is_override() && point.active_rakes > 0 {
                return Err(StoreError::ActiveRakesPresent {
                    point_id: point.point_id.clone(),
                    active: point.active_rakes,
                });
            }

            tracing::info!(point_id = %point.point_id, from = %point.state, to = %state, "loading point state changed");
            point.state = state;
            Ok(())
        })
    }

    /// Drop a rake from the wait queue (cancel / reassignment).
    /// Returns whether it was present.
    pub fn remove_queued(&self, point_id: &str, rake_id: &str) -> StoreResult<bool> {
        self.with_point(point_id, |point| {
            match point.queue_position(rake_id) {
                Some(index) => {
                    point.queue.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Re-insert a rake at its former queue position (rollback of a
    /// failed reassignment).
    pub fn insert_queued(&self, point_id: &str, rake_id: &str, position: usize) -> StoreResult<()> {
        self.with_point(point_id, |point| {
            let index = position.min(point.queue.len());
            point.queue.insert(index, rake_id.to_string());
            Ok(())
        })
    }

    // ==========================================
    // Queries
    // ==========================================

    pub fn status(&self, point_id: &str) -> StoreResult<PointStatus> {
        let point = self.get(point_id)?;
        Ok(PointStatus {
            state: point.effective_state(),
            utilization_pct: point.utilization_pct(),
            queue_length: point.queue_length(),
        })
    }

    pub fn queue_position(&self, point_id: &str, rake_id: &str) -> StoreResult<Option<usize>> {
        Ok(self.get(point_id)?.queue_position(rake_id))
    }

    /// Same-class peers that could take a queued rake right now.
    pub fn peer_points(&self, class_code: &str, exclude: &str) -> StoreResult<Vec<String>> {
        let mut peers: Vec<String> = self
            .snapshot()?
            .into_iter()
            .filter(|p| {
                p.point_id != exclude
                    && p.class_code == class_code
                    && p.effective_state() == OperationalState::Available
                    && p.has_free_slot()
            })
            .map(|p| p.point_id)
            .collect();
        peers.sort();
        Ok(peers)
    }

    pub fn get(&self, point_id: &str) -> StoreResult<LoadingPoint> {
        let record = self.record(point_id)?;
        let guard = lock_with_retry(&record, point_id, self.lock_settings)?;
        Ok(guard.clone())
    }

    /// Owned copies of every point, sorted by id for determinism.
    pub fn snapshot(&self) -> StoreResult<Vec<LoadingPoint>> {
        let arcs: Vec<(String, Arc<Mutex<LoadingPoint>>)> = {
            let map = self
                .points
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };

        let mut points = Vec::with_capacity(arcs.len());
        for (id, record) in arcs {
            let guard = lock_with_retry(&record, &id, self.lock_settings)?;
            points.push(guard.clone());
        }
        points.sort_by(|a, b| a.point_id.cmp(&b.point_id));
        Ok(points)
    }

    // ==========================================
    // Internals
    // ==========================================

    fn record(&self, point_id: &str) -> StoreResult<Arc<Mutex<LoadingPoint>>> {
        let map = self
            .points
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(point_id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "LoadingPoint".to_string(),
            id: point_id.to_string(),
        })
    }

    fn with_point<R>(
        &self,
        point_id: &str,
        mutate: impl FnOnce(&mut LoadingPoint) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let record = self.record(point_id)?;
        let mut guard = lock_with_retry(&record, point_id, self.lock_settings)?;

        let result = mutate(&mut guard)?;
        if !guard.state.is_override() {
            guard.state = if guard.active_rakes > 0 {
                OperationalState::Busy
            } else {
                OperationalState::Available
            };
        }
        guard.updated_at = Utc::now();
        debug_assert!(guard.invariant_holds());
        Ok(result)
    }
}
