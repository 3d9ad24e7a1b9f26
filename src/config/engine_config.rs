// ==========================================
// Rake Formation DSS - Engine Configuration
// ==========================================
// Every tunable threshold lives here so plant operators can adjust
// sensitivity without a rebuild. Serialized as JSON.
// ==========================================

use crate::domain::types::{ImpactLevel, StockStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// StatusBands - inventory health thresholds
// ==========================================
// Bands over utilization u = current / capacity:
//   u >= excess_at                 -> Excess
//   low_below <= u < excess_at     -> Adequate (Low if available < reserved)
//   critical_below <= u < low_below -> Low
//   u < critical_below             -> Critical
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusBands {
    pub critical_below: f64,
    pub low_below: f64,
    pub excess_at: f64,
}

impl Default for StatusBands {
    fn default() -> Self {
        Self {
            critical_below: 0.10,
            low_below: 0.25,
            excess_at: 1.0,
        }
    }
}

impl StatusBands {
    /// Derive the health label for a stock record.
    pub fn classify(&self, current_t: f64, capacity_t: f64, reserved_t: f64) -> StockStatus {
        let utilization = if capacity_t > 0.0 {
            current_t / capacity_t
        } else {
            0.0
        };

        if utilization >= self.excess_at {
            StockStatus::Excess
        } else if utilization >= self.low_below {
            let available_t = current_t - reserved_t;
            if available_t >= reserved_t {
                StockStatus::Adequate
            } else {
                StockStatus::Low
            }
        } else if utilization >= self.critical_below {
            StockStatus::Low
        } else {
            StockStatus::Critical
        }
    }
}

// ==========================================
// EngineConfig - full tunable set
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // ===== Inventory health =====
    pub status_bands: StatusBands,
    /// Per-material-type overrides shadowing the global bands.
    pub status_band_overrides: HashMap<String, StatusBands>,

    // ===== Formation lifecycle =====
    /// Minimum fill fraction before a Loading formation may be marked Ready.
    pub ready_threshold: f64,
    /// Rake capacity applied when an order does not specify one (tonnes).
    pub default_rake_capacity_t: f64,

    // ===== Lock retry policy =====
    pub lock_retry_attempts: u32,
    pub lock_retry_backoff_ms: u64,

    // ===== Recommendation economics (rupees) =====
    /// Demurrage penalty per hour of avoidable delay.
    pub demurrage_rate_per_hour: i64,
    /// Delay attributed to each out-of-order loading line (hours).
    pub reorder_delay_hours_per_line: f64,
    /// Fixed dispatch overhead saved by merging two under-filled rakes.
    pub merge_base_saving: i64,
    /// Fill fraction under which a Planning formation is a merge candidate.
    pub merge_fill_below: f64,

    // ===== Impact bucketing (rupees) =====
    pub impact_high_above: i64,
    pub impact_medium_above: i64,

    // ===== Confidence weighting =====
    pub confidence_completeness_weight: f64,
    pub confidence_accuracy_weight: f64,

    // ===== Evaluation service =====
    pub evaluation_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            status_bands: StatusBands::default(),
            status_band_overrides: HashMap::new(),
            ready_threshold: 0.90,
            default_rake_capacity_t: 2500.0,
            lock_retry_attempts: 5,
            lock_retry_backoff_ms: 10,
            demurrage_rate_per_hour: 1500,
            reorder_delay_hours_per_line: 0.5,
            merge_base_saving: 8500,
            merge_fill_below: 0.5,
            impact_high_above: 10_000,
            impact_medium_above: 2_000,
            confidence_completeness_weight: 0.4,
            confidence_accuracy_weight: 0.6,
            evaluation_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Bands for a material type, honoring per-type overrides.
    pub fn bands_for(&self, material_type: &str) -> StatusBands {
        self.status_band_overrides
            .get(material_type)
            .copied()
            .unwrap_or(self.status_bands)
    }

    /// Deterministic bucketing of a potential saving into an impact level.
    pub fn impact_for_savings(&self, savings: Option<i64>) -> ImpactLevel {
        match savings {
            Some(s) if s > self.impact_high_above => ImpactLevel::High,
            Some(s) if s > self.impact_medium_above => ImpactLevel::Medium,
            _ => ImpactLevel::Low,
        }
    }
}
