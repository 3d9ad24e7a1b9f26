// ==========================================
// Rake Formation DSS - Query API
// ==========================================
// Read-only snapshots shaped for the dashboard: quantities in
// tonnes, percentages as 0-100 floats, currency in whole rupees,
// identifiers as opaque strings. Queries only fail on unknown
// identifiers.
// ==========================================

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::domain::rake::RakeFormation;
use crate::domain::recommendation::RecommendationTarget;
use crate::domain::types::{
    FormationState, ImpactLevel, OperationalState, Priority, RecommendationKind, StockStatus,
};
use crate::engine::status::StockStatusDeriver;
use crate::store::formation_store::FormationStore;
use crate::store::ledger::InventoryLedger;
use crate::store::recommendation_store::RecommendationStore;
use crate::store::registry::{LoadingPointRegistry, PointStatus};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

// ==========================================
// View shapes (dashboard props)
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct MaterialStockView {
    pub material_type: String,
    pub location: String,
    pub current_t: f64,
    pub capacity_t: f64,
    pub reserved_t: f64,
    pub status: StockStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadingPointView {
    pub point_id: String,
    pub name: String,
    pub capacity: u32,
    pub active_rakes: u32,
    pub queue_length: usize,
    pub utilization_pct: f64,
    pub avg_loading_hours: f64,
    pub status: OperationalState,
    /// Rough wait until a slot frees; only meaningful while busy.
    pub next_available_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RakeMaterialView {
    pub material_type: String,
    pub quantity_t: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct RakeFormationView {
    pub rake_id: String,
    pub destination: String,
    pub loading_point: String,
    pub capacity_t: f64,
    pub current_load_t: f64,
    pub materials: Vec<RakeMaterialView>,
    pub status: FormationState,
    pub estimated_cost: Option<i64>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationView {
    pub id: String,
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub impact: ImpactLevel,
    pub potential_savings: Option<i64>,
    pub implementation_hours: Option<f64>,
    pub confidence: f64,
    pub target: RecommendationTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_rakes: usize,
    pub active_rakes: usize,
    pub completed_today: usize,
    pub avg_loading_hours: f64,
    /// Running savings from implemented recommendations (rupees).
    pub cost_savings: i64,
    /// Mean fill of live formations, 0-100.
    pub efficiency_pct: f64,
}

// ==========================================
// QueryApi
// ==========================================
pub struct QueryApi {
    ledger: Arc<InventoryLedger>,
    registry: Arc<LoadingPointRegistry>,
    formations: Arc<FormationStore>,
    recommendations: Arc<RecommendationStore>,
    deriver: StockStatusDeriver,
    config: Arc<ConfigManager>,
}

impl QueryApi {
    pub fn new(
        ledger: Arc<InventoryLedger>,
        registry: Arc<LoadingPointRegistry>,
        formations: Arc<FormationStore>,
        recommendations: Arc<RecommendationStore>,
        config: Arc<ConfigManager>,
    ) -> Self {
        let deriver = StockStatusDeriver::new(Arc::clone(&config));
        Self {
            ledger,
            registry,
            formations,
            recommendations,
            deriver,
            config,
        }
    }

    // ==========================================
    // Inventory
    // ==========================================

    pub fn material_stocks(&self) -> ApiResult<Vec<MaterialStockView>> {
        let stocks = self.ledger.snapshot()?;
        Ok(stocks
            .iter()
            .map(|s| MaterialStockView {
                material_type: s.material_type.clone(),
                location: s.location.clone(),
                current_t: s.current_t,
                capacity_t: s.capacity_t,
                reserved_t: s.reserved_t,
                status: self.deriver.derive(s),
            })
            .collect())
    }

    pub fn stock_status(&self, material_type: &str, location: &str) -> ApiResult<StockStatus> {
        let bands = self.config.bands_for(material_type);
        Ok(self.ledger.status(material_type, location, &bands)?)
    }

    // ==========================================
    // Loading points
    // ==========================================

    pub fn loading_points(&self) -> ApiResult<Vec<LoadingPointView>> {
        let points = self.registry.snapshot()?;
        Ok(points
            .into_iter()
            .map(|p| {
                let status = p.effective_state();
                let next_available_hours = if status == OperationalState::Busy {
                    Some(p.avg_loading_hours)
                } else {
                    None
                };
                LoadingPointView {
                    point_id: p.point_id.clone(),
                    name: p.name.clone(),
                    capacity: p.capacity_slots,
                    active_rakes: p.active_rakes,
                    queue_length: p.queue_length(),
                    utilization_pct: p.utilization_pct(),
                    avg_loading_hours: p.avg_loading_hours,
                    status,
                    next_available_hours,
                }
            })
            .collect())
    }

    pub fn loading_point_status(&self, point_id: &str) -> ApiResult<PointStatus> {
        Ok(self.registry.status(point_id)?)
    }

    // ==========================================
    // Formations
    // ==========================================

    pub fn rake_formations(&self) -> ApiResult<Vec<RakeFormationView>> {
        let formations = self.formations.snapshot()?;
        Ok(formations.iter().map(Self::formation_view).collect())
    }

    pub fn formation(&self, formation_id: &str) -> ApiResult<RakeFormationView> {
        let formation = self.formations.get(formation_id)?;
        Ok(Self::formation_view(&formation))
    }

    // ==========================================
    // Recommendations
    // ==========================================

    /// Active proposals, ranked: impact desc, confidence desc,
    /// savings desc.
    pub fn recommendations(&self) -> ApiResult<Vec<RecommendationView>> {
        let active = self.recommendations.active_ranked()?;
        Ok(active
            .into_iter()
            .map(|r| RecommendationView {
                id: r.id,
                kind: r.kind,
                title: r.title,
                description: r.description,
                impact: r.impact,
                potential_savings: r.potential_savings,
                implementation_hours: r.implementation_hours,
                confidence: r.confidence,
                target: r.target,
            })
            .collect())
    }

    // ==========================================
    // Dashboard metrics
    // ==========================================

    pub fn dashboard_metrics(&self) -> ApiResult<DashboardMetrics> {
        let formations = self.formations.snapshot()?;
        let points = self.registry.snapshot()?;

        let today = Utc::now().date_naive();
        let total_rakes = formations.len();
        let active_rakes = formations
            .iter()
            .filter(|f| f.status == FormationState::Loading)
            .count();
        let completed_today = formations
            .iter()
            .filter(|f| {
                f.status == FormationState::Dispatched
                    && f.dispatched_at.map(|t| t.date_naive()) == Some(today)
            })
            .count();

        let avg_loading_hours = if points.is_empty() {
            0.0
        } else {
            points.iter().map(|p| p.avg_loading_hours).sum::<f64>() / points.len() as f64
        };

        let live: Vec<&RakeFormation> = formations
            .iter()
            .filter(|f| f.status != FormationState::Dispatched)
            .collect();
        let efficiency_pct = if live.is_empty() {
            0.0
        } else {
            live.iter().map(|f| f.fill_fraction()).sum::<f64>() / live.len() as f64 * 100.0
        };

        Ok(DashboardMetrics {
            total_rakes,
            active_rakes,
            completed_today,
            avg_loading_hours,
            cost_savings: self.recommendations.implemented_savings_total()?,
            efficiency_pct,
        })
    }

    // ==========================================
    // Internals
    // ==========================================

    /// Dashboard shape: one line per (type, priority), aggregated
    /// across stockyards; demand lines before allocation.
    fn formation_view(formation: &RakeFormation) -> RakeFormationView {
        let mut materials: Vec<RakeMaterialView> = Vec::new();
        if formation.materials.is_empty() {
            for demand in &formation.demands {
                materials.push(RakeMaterialView {
                    material_type: demand.material_type.clone(),
                    quantity_t: demand.quantity_t,
                    priority: demand.priority,
                });
            }
        } else {
            for line in &formation.materials {
                match materials.iter_mut().find(|m| {
                    m.material_type == line.material_type && m.priority == line.priority
                }) {
                    Some(existing) => existing.quantity_t += line.quantity_t,
                    None => materials.push(RakeMaterialView {
                        material_type: line.material_type.clone(),
                        quantity_t: line.quantity_t,
                        priority: line.priority,
                    }),
                }
            }
        }

        RakeFormationView {
            rake_id: formation.formation_id.clone(),
            destination: formation.destination.clone(),
            loading_point: formation.loading_point_id.clone(),
            capacity_t: formation.capacity_t,
            current_load_t: formation.current_load_t,
            materials,
            status: formation.status,
            estimated_cost: formation.estimated_cost,
            estimated_hours: formation.estimated_hours,
        }
    }
}
