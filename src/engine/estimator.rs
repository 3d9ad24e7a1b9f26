// ==========================================
// Rake Formation DSS - Cost & Time Estimation
// ==========================================
// Deterministic estimates from the external rate table collaborator:
// cost from destination distance tier, tonnage and per-material
// freight rates; time from loading-point average duration and queue
// position.
// ==========================================

use crate::domain::rake::RakeFormation;
use crate::domain::types::DistanceTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ==========================================
// RouteOption - a routing choice for a destination
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub route: String,
    /// Uncongested transit time (hours).
    pub base_hours: f64,
}

// ==========================================
// RateTable - external collaborator
// ==========================================
// The core treats the rate table as a pure lookup; tariffs and
// congestion curves are maintained outside the engine.
pub trait RateTable: Send + Sync {
    /// Freight tariff in rupees per tonne.
    fn freight_rate(&self, tier: DistanceTier, material_type: &str) -> i64;

    /// Congestion multiplier applied to a route's base hours (1.0 =
    /// free flowing).
    fn congestion(&self, route: &str) -> f64;

    fn distance_tier(&self, destination: &str) -> DistanceTier;

    /// Routing choices for a destination; the first entry is the
    /// primary route.
    fn routes(&self, destination: &str) -> Vec<RouteOption>;
}

// ==========================================
// StaticRateTable - in-crate lookup implementation
// ==========================================
#[derive(Default)]
pub struct StaticRateTable {
    rates: HashMap<(DistanceTier, String), i64>,
    default_rate: i64,
    congestion: HashMap<String, f64>,
    tiers: HashMap<String, DistanceTier>,
    routes: HashMap<String, Vec<RouteOption>>,
}

impl StaticRateTable {
    pub fn new(default_rate: i64) -> Self {
        Self {
            default_rate,
            ..Default::default()
        }
    }

    pub fn with_rate(mut self, tier: DistanceTier, material_type: &str, rate: i64) -> Self {
        self.rates.insert((tier, material_type.to_string()), rate);
        self
    }

    pub fn with_congestion(mut self, route: &str, multiplier: f64) -> Self {
        self.congestion.insert(route.to_string(), multiplier);
        self
    }

    pub fn with_tier(mut self, destination: &str, tier: DistanceTier) -> Self {
        self.tiers.insert(destination.to_string(), tier);
        self
    }

    pub fn with_routes(mut self, destination: &str, routes: Vec<RouteOption>) -> Self {
        self.routes.insert(destination.to_string(), routes);
        self
    }
}

impl RateTable for StaticRateTable {
    fn freight_rate(&self, tier: DistanceTier, material_type: &str) -> i64 {
        self.rates
            .get(&(tier, material_type.to_string()))
            .copied()
            .unwrap_or(self.default_rate)
    }

    fn congestion(&self, route: &str) -> f64 {
        self.congestion.get(route).copied().unwrap_or(1.0)
    }

    fn distance_tier(&self, destination: &str) -> DistanceTier {
        self.tiers
            .get(destination)
            .copied()
            .unwrap_or(DistanceTier::Regional)
    }

    fn routes(&self, destination: &str) -> Vec<RouteOption> {
        self.routes.get(destination).cloned().unwrap_or_default()
    }
}

// ==========================================
// CostTimeEstimator
// ==========================================
pub struct CostTimeEstimator {
    rate_table: Arc<dyn RateTable>,
}

impl CostTimeEstimator {
    pub fn new(rate_table: Arc<dyn RateTable>) -> Self {
        Self { rate_table }
    }

    pub fn rate_table(&self) -> &Arc<dyn RateTable> {
        &self.rate_table
    }

    /// Freight cost of the loaded lines (falls back to the demand
    /// lines for a Planning formation), in whole rupees.
    pub fn estimate_cost(&self, formation: &RakeFormation) -> i64 {
        let tier = self.rate_table.distance_tier(&formation.destination);

        let loaded: f64 = if formation.materials.is_empty() {
            formation
                .demands
                .iter()
                .map(|d| d.quantity_t * self.rate_table.freight_rate(tier, &d.material_type) as f64)
                .sum()
        } else {
            formation
                .materials
                .iter()
                .map(|m| m.quantity_t * self.rate_table.freight_rate(tier, &m.material_type) as f64)
                .sum()
        };

        loaded.round() as i64
    }

    /// Hours until loading completes: the point's average duration,
    /// scaled by how many rakes must finish first. Position 0 means a
    /// slot is held now.
    pub fn estimate_hours(&self, avg_loading_hours: f64, queue_position: usize) -> f64 {
        avg_loading_hours * (queue_position as f64 + 1.0)
    }

    /// Congestion-weighted transit hours of a concrete route choice.
    pub fn route_hours(&self, route: &RouteOption) -> f64 {
        route.base_hours * self.rate_table.congestion(&route.route)
    }

    /// Primary route id for a destination; "direct" when the rate
    /// table has no routing data.
    pub fn primary_route(&self, destination: &str) -> String {
        self.rate_table
            .routes(destination)
            .first()
            .map(|r| r.route.clone())
            .unwrap_or_else(|| "direct".to_string())
    }
}
