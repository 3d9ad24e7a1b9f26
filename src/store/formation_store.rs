// ==========================================
// Rake Formation DSS - Formation Store
// ==========================================
// Exclusively owns RakeFormation records on behalf of the Planner.
// Dispatched formations are immutable history and are never removed;
// cancellation removes the record entirely.
// ==========================================

use crate::domain::rake::RakeFormation;
use crate::domain::types::FormationState;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{lock_with_retry, LockSettings};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

// ==========================================
// FormationStore
// ==========================================
pub struct FormationStore {
    records: RwLock<HashMap<String, Arc<Mutex<RakeFormation>>>>,
    lock_settings: LockSettings,
}

impl FormationStore {
    pub fn new(lock_settings: LockSettings) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            lock_settings,
        }
    }

    pub fn insert(&self, formation: RakeFormation) -> StoreResult<()> {
        let mut map = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if map.contains_key(&formation.formation_id) {
            return Err(StoreError::Duplicate {
                entity: "RakeFormation".to_string(),
                id: formation.formation_id.clone(),
            });
        }

        map.insert(
            formation.formation_id.clone(),
            Arc::new(Mutex::new(formation)),
        );
        Ok(())
    }

    /// Re-insert a formation removed by a cancel whose cleanup failed
    /// (rollback to the pre-call state). Overwrites silently.
    pub fn reinsert(&self, formation: RakeFormation) {
        let mut map = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(
            formation.formation_id.clone(),
            Arc::new(Mutex::new(formation)),
        );
    }

    /// Run a mutation under the formation's record lock. The closure
    /// decides the error type so engine rules can surface their own
    /// taxonomy without a second lookup.
    pub fn with_formation<R, E, F>(&self, formation_id: &str, mutate: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut RakeFormation) -> Result<R, E>,
    {
        let record = self.record(formation_id)?;
        let mut guard = match lock_with_retry(&record, formation_id, self.lock_settings) {
            Ok(guard) => guard,
            Err(e) => return Err(E::from(e)),
        };

        let result = mutate(&mut guard)?;
        guard.updated_at = Utc::now();
        Ok(result)
    }

    /// Atomically remove a non-dispatched formation (cancel path).
    pub fn remove(&self, formation_id: &str) -> StoreResult<RakeFormation> {
        let mut map = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let record = map.get(formation_id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "RakeFormation".to_string(),
            id: formation_id.to_string(),
        })?;

        {
            let guard = lock_with_retry(&record, formation_id, self.lock_settings)?;
            if guard.status == FormationState::Dispatched {
                return Err(StoreError::InvalidStateTransition {
                    entity: "RakeFormation".to_string(),
                    id: formation_id.to_string(),
                    from: guard.status.to_string(),
                    to: "cancelled".to_string(),
                });
            }
        }

        map.remove(formation_id);
        let formation = record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Ok(formation)
    }

    pub fn get(&self, formation_id: &str) -> StoreResult<RakeFormation> {
        let record = self.record(formation_id)?;
        let guard = lock_with_retry(&record, formation_id, self.lock_settings)?;
        Ok(guard.clone())
    }

    pub fn contains(&self, formation_id: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(formation_id)
    }

    /// Owned copies of every formation, ordered by creation time then
    /// id for determinism.
    pub fn snapshot(&self) -> StoreResult<Vec<RakeFormation>> {
        let arcs: Vec<(String, Arc<Mutex<RakeFormation>>)> = {
            let map = self
                .records
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };

        let mut formations = Vec::with_capacity(arcs.len());
        for (id, record) in arcs {
            let guard = lock_with_retry(&record, &id, self.lock_settings)?;
            formations.push(guard.clone());
        }
        formations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.formation_id.cmp(&b.formation_id))
        });
        Ok(formations)
    }

    fn record(&self, formation_id: &str) -> StoreResult<Arc<Mutex<RakeFormation>>> {
        let map = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(formation_id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "RakeFormation".to_string(),
            id: formation_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formation(id: &str) -> RakeFormation {
        RakeFormation::new(id, "Port Terminal", "direct", "LP-003", 3000.0, vec![])
    }

    #[test]
    fn test_insert_and_get() {
        let store = FormationStore::new(LockSettings::default());
        store.insert(formation("RK001")).unwrap();

        let loaded = store.get("RK001").unwrap();
        assert_eq!(loaded.destination, "Port Terminal");
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = FormationStore::new(LockSettings::default());
        store.insert(formation("RK001")).unwrap();
        let err = store.insert(formation("RK001")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn test_remove_refuses_dispatched() {
        let store = FormationStore::new(LockSettings::default());
        store.insert(formation("RK001")).unwrap();
        store
            .with_formation::<_, StoreError, _>("RK001", |f| {
                f.status = FormationState::Dispatched;
                Ok(())
            })
            .unwrap();

        let err = store.remove("RK001").unwrap_err();
        assert!(matches!(err, StoreError::InvalidStateTransition { .. }));
        assert!(store.contains("RK001"));
    }

    #[test]
    fn test_remove_returns_record() {
        let store = FormationStore::new(LockSettings::default());
        store.insert(formation("RK001")).unwrap();

        let removed = store.remove("RK001").unwrap();
        assert_eq!(removed.formation_id, "RK001");
        assert!(!store.contains("RK001"));
    }
}
