// ==========================================
// Rake Formation DSS - Stock Status Derivation
// ==========================================
// Stateless derivation of inventory health labels from stock levels
// under the configured utilization bands. Status is always derived
// on read, never persisted.
// ==========================================

use crate::config::ConfigManager;
use crate::domain::material::MaterialStock;
use crate::domain::types::StockStatus;
use std::sync::Arc;

// ==========================================
// StockStatusDeriver
// ==========================================
pub struct StockStatusDeriver {
    config: Arc<ConfigManager>,
}

impl StockStatusDeriver {
    pub fn new(config: Arc<ConfigManager>) -> Self {
        Self { config }
    }

    /// Health label for one stock record, honoring per-material-type
    /// band overrides.
    pub fn derive(&self, stock: &MaterialStock) -> StockStatus {
        self.config
            .bands_for(&stock.material_type)
            .classify(stock.current_t, stock.capacity_t, stock.reserved_t)
    }

    /// Worst label across a set of records (dashboard headline).
    pub fn worst_of(&self, stocks: &[MaterialStock]) -> Option<StockStatus> {
        stocks
            .iter()
            .map(|s| self.derive(s))
            .max_by_key(|status| match status {
                StockStatus::Adequate => 0,
                StockStatus::Excess => 1,
                StockStatus::Low => 2,
                StockStatus::Critical => 3,
            })
    }
}
