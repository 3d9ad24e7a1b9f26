// ==========================================
// Rake Formation DSS - Inventory Ledger
// ==========================================
// Exclusively owns MaterialStock records keyed by (type, location).
// All mutations are atomic per key: the record mutex is held across
// the invariant check and the write, so no two reservations can push
// reserved above current.
// ==========================================

use crate::config::engine_config::StatusBands;
use crate::domain::material::{MaterialStock, StockKey};
use crate::domain::types::StockStatus;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{lock_with_retry, LockSettings};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

// ==========================================
// InventoryLedger
// ==========================================
pub struct InventoryLedger {
    records: RwLock<HashMap<StockKey, Arc<Mutex<MaterialStock>>>>,
    lock_settings: LockSettings,
}

impl InventoryLedger {
    pub fn new(lock_settings: LockSettings) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            lock_settings,
        }
    }

    // ==========================================
    // Plant configuration
    // ==========================================

    /// Register a zeroed stock record for a (type, location) pair.
    pub fn define_stock(
        &self,
        material_type: &str,
        location: &str,
        capacity_t: f64,
    ) -> StoreResult<()> {
        let key = StockKey::new(material_type, location);
        let mut map = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if map.contains_key(&key) {
            return Err(StoreError::Duplicate {
                entity: "MaterialStock".to_string(),
                id: key.to_string(),
            });
        }

        map.insert(
            key.clone(),
            Arc::new(Mutex::new(MaterialStock::new(material_type, location, capacity_t))),
        );
        tracing::info!(%key, capacity_t, "stock record defined");
        Ok(())
    }

    // ==========================================
    // Mutations
    // ==========================================

    /// Stock receipt. Rejected (not clipped) when the stockyard slot
    /// would overflow, so callers can react.
    pub fn receive(&self, material_type: &str, location: &str, quantity_t: f64) -> StoreResult<()> {
        self.with_record(material_type, location, |stock| {
            if stock.current_t + quantity_t > stock.capacity_t {
                return Err(StoreError::CapacityExceeded {
                    material_type: stock.material_type.clone(),
                    location: stock.location.clone(),
                    current_t: stock.current_t,
                    capacity_t: stock.capacity_t,
                    delta_t: quantity_t,
                });
            }
            stock.current_t += quantity_t;
            tracing::debug!(
                material_type = %stock.material_type,
                location = %stock.location,
                quantity_t,
                current_t = stock.current_t,
                "stock received"
            );
            Ok(())
        })
    }

    /// Reserve available stock for a formation.
    pub fn reserve(&self, material_type: &str, location: &str, quantity_t: f64) -> StoreResult<()> {
        self.with_record(material_type, location, |stock| {
            let available_t = stock.available_t();
            if quantity_t > available_t {
                return Err(StoreError::InsufficientAvailable {
                    material_type: stock.material_type.clone(),
                    location: stock.location.clone(),
                    requested_t: quantity_t,
                    available_t,
                });
            }
            stock.reserved_t += quantity_t;
            Ok(())
        })
    }

    /// Release a reservation (allocation rollback or rake cancel).
    pub fn release(&self, material_type: &str, location: &str, quantity_t: f64) -> StoreResult<()> {
        self.with_record(material_type, location, |stock| {
            if quantity_t > stock.reserved_t {
                return Err(StoreError::InvalidRelease {
                    material_type: stock.material_type.clone(),
                    location: stock.location.clone(),
                    requested_t: quantity_t,
                    reserved_t: stock.reserved_t,
                });
            }
            stock.reserved_t -= quantity_t;
            Ok(())
        })
    }

    /// Physical departure at dispatch: the material leaves and its
    /// reservation clears together.
    pub fn consume(&self, material_type: &str, location: &str, quantity_t: f64) -> StoreResult<()> {
        self.with_record(material_type, location, |stock| {
            if quantity_t > stock.reserved_t {
                return Err(StoreError::InsufficientReserved {
                    material_type: stock.material_type.clone(),
                    location: stock.location.clone(),
                    requested_t: quantity_t,
                    reserved_t: stock.reserved_t,
                });
            }
            stock.current_t -= quantity_t;
            stock.reserved_t -= quantity_t;
            tracing::debug!(
                material_type = %stock.material_type,
                location = %stock.location,
                quantity_t,
                current_t = stock.current_t,
                "stock consumed"
            );
            Ok(())
        })
    }

    /// Signed stock correction. May not push current below reserved
    /// or above capacity.
    pub fn adjust(&self, material_type: &str, location: &str, delta_t: f64) -> StoreResult<()> {
        self.with_record(material_type, location, |stock| {
            let next_t = stock.current_t + delta_t;
            if next_t < stock.reserved_t {
                return Err(StoreError::InvalidAdjustment {
                    material_type: stock.material_type.clone(),
                    location: stock.location.clone(),
                    delta_t,
                    reason: format!(
                        "adjusted level {next_t}t would fall below reserved {}t",
                        stock.reserved_t
                    ),
                });
            }
            if next_t > stock.capacity_t {
                return Err(StoreError::InvalidAdjustment {
                    material_type: stock.material_type.clone(),
                    location: stock.location.clone(),
                    delta_t,
                    reason: format!(
                        "adjusted level {next_t}t would exceed capacity {}t",
                        stock.capacity_t
                    ),
                });
            }
            stock.current_t = next_t;
            Ok(())
        })
    }

    // ==========================================
    // Queries
    // ==========================================

    /// Derived health label under the supplied bands.
    pub fn status(
        &self,
        material_type: &str,
        location: &str,
        bands: &StatusBands,
    ) -> StoreResult<StockStatus> {
        let stock = self.get(material_type, location)?;
        Ok(bands.classify(stock.current_t, stock.capacity_t, stock.reserved_t))
    }

    pub fn get(&self, material_type: &str, location: &str) -> StoreResult<MaterialStock> {
        let key = StockKey::new(material_type, location);
        let record = self.record(&key)?;
        let guard = lock_with_retry(&record, &key.to_string(), self.lock_settings)?;
        Ok(guard.clone())
    }

    pub fn contains(&self, material_type: &str, location: &str) -> bool {
        let key = StockKey::new(material_type, location);
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&key)
    }

    /// Locations holding a material type, ordered by available
    /// quantity descending (allocation order).
    pub fn locations_of(&self, material_type: &str) -> StoreResult<Vec<(String, f64)>> {
        let mut locations = Vec::new();
        for stock in self.snapshot()? {
            if stock.material_type == material_type {
                locations.push((stock.location.clone(), stock.available_t()));
            }
        }
        locations.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(locations)
    }

    /// Owned copies of every record, sorted by key for determinism.
    pub fn snapshot(&self) -> StoreResult<Vec<MaterialStock>> {
        let arcs: Vec<(StockKey, Arc<Mutex<MaterialStock>>)> = {
            let map = self
                .records
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };

        let mut stocks = Vec::with_capacity(arcs.len());
        for (key, record) in arcs {
            let guard = lock_with_retry(&record, &key.to_string(), self.lock_settings)?;
            stocks.push(guard.clone());
        }
        stocks.sort_by(|a, b| {
            a.material_type
                .cmp(&b.material_type)
                .then_with(|| a.location.cmp(&b.location))
        });
        Ok(stocks)
    }

    // ==========================================
    // Internals
    // ==========================================

    fn record(&self, key: &StockKey) -> StoreResult<Arc<Mutex<MaterialStock>>> {
        let map = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "MaterialStock".to_string(),
            id: key.to_string(),
        })
    }

    fn with_record<R>(
        &self,
        material_type: &str,
        location: &str,
        mutate: impl FnOnce(&mut MaterialStock) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let key = StockKey::new(material_type, location);
        let record = self.record(&key)?;
        let mut guard = lock_with_retry(&record, &key.to_string(), self.lock_settings)?;

        let result = mutate(&mut guard)?;
        guard.updated_at = Utc::now();
        debug_assert!(guard.invariant_holds());
        Ok(result)
    }
}
