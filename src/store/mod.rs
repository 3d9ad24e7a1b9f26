// ==========================================
// Rake Formation DSS - Store Layer
// ==========================================
// Each store exclusively owns one entity collection behind per-key
// record locks: a read/write map lock guards membership, a per-record
// mutex guards the record, so independent keys proceed in parallel.
// Record locks are bounded: contention surfaces as an error instead
// of blocking indefinitely.
// ==========================================

pub mod error;
pub mod formation_store;
pub mod ledger;
pub mod recommendation_store;
pub mod registry;

pub use error::{StoreError, StoreResult};
pub use formation_store::FormationStore;
pub use ledger::InventoryLedger;
pub use recommendation_store::RecommendationStore;
pub use registry::{EnqueueOutcome, LoadingPointRegistry, PointStatus};

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;

// ==========================================
// Lock retry policy
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_ms: 10,
        }
    }
}

/// Acquire a record mutex with bounded retries and exponential
/// backoff. Exhaustion returns `LockContention`; a poisoned lock is
/// reported rather than propagated as a panic.
pub(crate) fn lock_with_retry<'a, T>(
    mutex: &'a Mutex<T>,
    resource: &str,
    settings: LockSettings,
) -> StoreResult<MutexGuard<'a, T>> {
    let attempts = settings.attempts.max(1);
    let mut backoff_ms = settings.backoff_ms.max(1);

    for attempt in 1..=attempts {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(e)) => {
                return Err(StoreError::LockPoisoned(e.to_string()));
            }
            Err(TryLockError::WouldBlock) => {
                if attempt < attempts {
                    tracing::debug!(resource, attempt, backoff_ms, "record lock contended, backing off");
                    thread::sleep(Duration::from_millis(backoff_ms));
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    Err(StoreError::LockContention {
        resource: resource.to_string(),
        attempts,
    })
}
