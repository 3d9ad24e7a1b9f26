// ==========================================
// Rake Formation DSS - Recommendation Domain Model
// ==========================================
// Owned exclusively by the Recommendation Engine; holds identifier
// references into the other stores only.
// ==========================================

use crate::domain::types::{ImpactLevel, RecommendationKind, RecommendationState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RecommendationTarget - identifier reference
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecommendationTarget {
    Rake(String),
    LoadingPoint(String),
}

impl RecommendationTarget {
    pub fn id(&self) -> &str {
        match self {
            RecommendationTarget::Rake(id) => id,
            RecommendationTarget::LoadingPoint(id) => id,
        }
    }
}

// ==========================================
// RecommendedAction - the mutation `implement` applies
// ==========================================
// Exhaustively matched; every variant carries the identifiers the
// mutation needs, so implementation never re-derives context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Re-sort a formation's lines into priority order.
    ReorderMaterials { formation_id: String },
    /// Fold the donor's demands into the primary and cancel the donor.
    MergeFormations { primary: String, donor: String },
    /// Point the formation at an alternate route.
    SwitchRoute { formation_id: String, route: String },
    /// Move a queued rake to a same-class peer point.
    ReassignQueuedRake {
        from_point: String,
        to_point: String,
        rake_id: String,
    },
}

impl RecommendedAction {
    /// Stable key used to deduplicate candidates across evaluation
    /// cycles and to suppress re-surfacing dismissed proposals.
    pub fn dedup_key(&self) -> String {
        match self {
            RecommendedAction::ReorderMaterials { formation_id } => {
                format!("reorder/{formation_id}")
            }
            RecommendedAction::MergeFormations { primary, donor } => {
                format!("merge/{primary}/{donor}")
            }
            RecommendedAction::SwitchRoute { formation_id, route } => {
                format!("route/{formation_id}/{route}")
            }
            RecommendedAction::ReassignQueuedRake {
                from_point,
                to_point,
                rake_id,
            } => format!("reassign/{from_point}/{to_point}/{rake_id}"),
        }
    }
}

// ==========================================
// Recommendation
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,

    pub impact: ImpactLevel,
    /// Estimated saving in whole rupees.
    pub potential_savings: Option<i64>,
    /// Estimated effort to apply the action (hours).
    pub implementation_hours: Option<f64>,
    /// Confidence score, 0-100.
    pub confidence: f64,

    pub target: RecommendationTarget,
    pub action: RecommendedAction,
    pub state: RecommendationState,

    // ===== Audit fields =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    /// Ranking key: impact desc, confidence desc, savings desc.
    pub fn rank_key(&self) -> (ImpactLevel, i64, i64) {
        (
            self.impact,
            (self.confidence * 100.0).round() as i64,
            self.potential_savings.unwrap_or(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommendation(impact: ImpactLevel, confidence: f64, savings: Option<i64>) -> Recommendation {
        let now = Utc::now();
        Recommendation {
            id: "rec-001".to_string(),
            kind: RecommendationKind::Cost,
            title: "Optimize material loading sequence".to_string(),
            description: String::new(),
            impact,
            potential_savings: savings,
            implementation_hours: Some(0.5),
            confidence,
            target: RecommendationTarget::Rake("RK003".to_string()),
            action: RecommendedAction::ReorderMaterials {
                formation_id: "RK003".to_string(),
            },
            state: RecommendationState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rank_key_orders_impact_first() {
        let high = recommendation(ImpactLevel::High, 60.0, Some(12_000));
        let medium = recommendation(ImpactLevel::Medium, 99.0, Some(50_000));
        assert!(high.rank_key() > medium.rank_key());
    }

    #[test]
    fn test_rank_key_breaks_ties_on_confidence() {
        let confident = recommendation(ImpactLevel::Medium, 92.0, Some(5_000));
        let hesitant = recommendation(ImpactLevel::Medium, 78.0, Some(9_000));
        assert!(confident.rank_key() > hesitant.rank_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_actions() {
        let reorder = RecommendedAction::ReorderMaterials {
            formation_id: "RK001".to_string(),
        };
        let route = RecommendedAction::SwitchRoute {
            formation_id: "RK001".to_string(),
            route: "alt-1".to_string(),
        };
        assert_ne!(reorder.dedup_key(), route.dedup_key());
    }
}
