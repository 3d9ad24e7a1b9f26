// ==========================================
// Rake Formation DSS - Recommendation Store
// ==========================================
// Exclusively owns Recommendation records. Each evaluation cycle
// replaces the active candidate set; Implemented and Dismissed
// records are terminal and retained for audit, and a dismissed
// proposal is never resurfaced by a later cycle.
// ==========================================

use crate::domain::recommendation::Recommendation;
use crate::domain::types::RecommendationState;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{lock_with_retry, LockSettings};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

// ==========================================
// ReplaceReport - outcome of one publish
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceReport {
    pub inserted: usize,
    pub refreshed: usize,
    pub retired: usize,
    pub suppressed: usize,
}

// ==========================================
// RecommendationStore
// ==========================================
pub struct RecommendationStore {
    records: RwLock<HashMap<String, Arc<Mutex<Recommendation>>>>,
    lock_settings: LockSettings,
}

impl RecommendationStore {
    pub fn new(lock_settings: LockSettings) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            lock_settings,
        }
    }

    // ==========================================
    // Publish (evaluation cycle output)
    // ==========================================

    /// Replace the active set with a fresh candidate batch.
    /// - a candidate matching an existing active proposal keeps its id
    ///   and refreshes the scores;
    /// - a candidate matching a dismissed proposal is suppressed;
    /// - active proposals no longer produced are retired (removed).
    pub fn replace_active(&self, candidates: Vec<Recommendation>) -> StoreResult<ReplaceReport> {
        let mut map = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut dismissed_keys: HashSet<String> = HashSet::new();
        let mut active_by_key: HashMap<String, String> = HashMap::new();
        for (id, record) in map.iter() {
            let guard = lock_with_retry(record, id, self.lock_settings)?;
            match guard.state {
                RecommendationState::Dismissed => {
                    dismissed_keys.insert(guard.action.dedup_key());
                }
                RecommendationState::Active => {
                    active_by_key.insert(guard.action.dedup_key(), id.clone());
                }
                RecommendationState::Implemented => {}
            }
        }

        let mut report = ReplaceReport::default();
        let mut seen_keys: HashSet<String> = HashSet::new();

        for candidate in candidates {
            let key = candidate.action.dedup_key();
            if dismissed_keys.contains(&key) {
                report.suppressed += 1;
                continue;
            }
            if !seen_keys.insert(key.clone()) {
                continue;
            }

            if let Some(existing_id) = active_by_key.remove(&key) {
                if let Some(record) = map.get(&existing_id) {
                    let mut guard = lock_with_retry(record, &existing_id, self.lock_settings)?;
                    guard.impact = candidate.impact;
                    guard.potential_savings = candidate.potential_savings;
                    guard.implementation_hours = candidate.implementation_hours;
                    guard.confidence = candidate.confidence;
                    guard.description = candidate.description;
                    guard.updated_at = Utc::now();
                    report.refreshed += 1;
                }
            } else {
                map.insert(candidate.id.clone(), Arc::new(Mutex::new(candidate)));
                report.inserted += 1;
            }
        }

        // Anything still in active_by_key was not re-proposed this cycle.
        for (_, stale_id) in active_by_key {
            map.remove(&stale_id);
            report.retired += 1;
        }

        tracing::info!(
            inserted = report.inserted,
            refreshed = report.refreshed,
            retired = report.retired,
            suppressed = report.suppressed,
            "recommendation set published"
        );
        Ok(report)
    }

    // ==========================================
    // Lifecycle commands
    // ==========================================

    /// Dismiss a proposal. Idempotent: dismissing an already terminal
    /// recommendation is a no-op, not an error.
    pub fn dismiss(&self, id: &str) -> StoreResult<()> {
        self.with_record(id, |rec| {
            if rec.state.is_terminal() {
                return Ok(());
            }
            rec.state = RecommendationState::Dismissed;
            tracing::info!(id = %rec.id, "recommendation dismissed");
            Ok(())
        })
    }

    /// Mark an active proposal implemented (terminal).
    pub fn mark_implemented(&self, id: &str) -> StoreResult<()> {
        self.with_record(id, |rec| {
            if rec.state != RecommendationState::Active {
                return Err(StoreError::InvalidStateTransition {
                    entity: "Recommendation".to_string(),
                    id: rec.id.clone(),
                    from: rec.state.to_string(),
                    to: RecommendationState::Implemented.to_string(),
                });
            }
            rec.state = RecommendationState::Implemented;
            tracing::info!(id = %rec.id, "recommendation implemented");
            Ok(())
        })
    }

    // ==========================================
    // Queries
    // ==========================================

    pub fn get(&self, id: &str) -> StoreResult<Recommendation> {
        let record = self.record(id)?;
        let guard = lock_with_retry(&record, id, self.lock_settings)?;
        Ok(guard.clone())
    }

    /// Active proposals ranked: impact desc, confidence desc, savings
    /// desc.
    pub fn active_ranked(&self) -> StoreResult<Vec<Recommendation>> {
        let mut active: Vec<Recommendation> = self
            .snapshot()?
            .into_iter()
            .filter(|r| r.state == RecommendationState::Active)
            .collect();
        active.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()).then_with(|| a.id.cmp(&b.id)));
        Ok(active)
    }

    /// Running total of savings from implemented recommendations.
    pub fn implemented_savings_total(&self) -> StoreResult<i64> {
        Ok(self
            .snapshot()?
            .iter()
            .filter(|r| r.state == RecommendationState::Implemented)
            .filter_map(|r| r.potential_savings)
            .sum())
    }

    pub fn snapshot(&self) -> StoreResult<Vec<Recommendation>> {
        let arcs: Vec<(String, Arc<Mutex<Recommendation>>)> = {
            let map = self
                .records
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };

        let mut records = Vec::with_capacity(arcs.len());
        for (id, record) in arcs {
            let guard = lock_with_retry(&record, &id, self.lock_settings)?;
            records.push(guard.clone());
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    // ==========================================
    // Internals
    // ==========================================

    fn record(&self, id: &str) -> StoreResult<Arc<Mutex<Recommendation>>> {
        let map = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "Recommendation".to_string(),
            id: id.to_string(),
        })
    }

    fn with_record<R>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Recommendation) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let record = self.record(id)?;
        let mut guard = lock_with_retry(&record, id, self.lock_settings)?;
        let result = mutate(&mut guard)?;
        guard.updated_at = Utc::now();
        Ok(result)
    }
}
