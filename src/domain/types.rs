// ==========================================
// Rake Formation DSS - Core Domain Types
// ==========================================
// Wire format: lowercase (aligned with the dashboard contract)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Priority (material demand priority)
// ==========================================
// Ordered: Low < Medium < High. Ties between equal priorities
// are broken by demand declaration order (stable sort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

// ==========================================
// Formation State (rake lifecycle)
// ==========================================
// Strictly forward: Planning -> Loading -> Ready -> Dispatched.
// Dispatched is terminal and immutable; a mis-planned rake is
// cancelled and recreated, never rewound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormationState {
    Planning,
    Loading,
    Ready,
    Dispatched,
}

impl fmt::Display for FormationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FormationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormationState::Planning => "planning",
            FormationState::Loading => "loading",
            FormationState::Ready => "ready",
            FormationState::Dispatched => "dispatched",
        }
    }

    /// Whether `next` is the single legal forward step from `self`.
    pub fn can_advance_to(&self, next: FormationState) -> bool {
        matches!(
            (self, next),
            (FormationState::Planning, FormationState::Loading)
                | (FormationState::Loading, FormationState::Ready)
                | (FormationState::Ready, FormationState::Dispatched)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FormationState::Dispatched)
    }
}

// ==========================================
// Operational State (loading point)
// ==========================================
// Available <-> Busy is automatic from the active rake count.
// Maintenance / Offline are operator overrides that suppress the
// automatic transition until cleared back to Available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalState {
    Available,
    Busy,
    Maintenance,
    Offline,
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalState::Available => "available",
            OperationalState::Busy => "busy",
            OperationalState::Maintenance => "maintenance",
            OperationalState::Offline => "offline",
        }
    }

    /// Operator override states halt intake and suppress automatic
    /// Available/Busy derivation.
    pub fn is_override(&self) -> bool {
        matches!(self, OperationalState::Maintenance | OperationalState::Offline)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(OperationalState::Available),
            "busy" => Some(OperationalState::Busy),
            "maintenance" => Some(OperationalState::Maintenance),
            "offline" => Some(OperationalState::Offline),
            _ => None,
        }
    }
}

// ==========================================
// Stock Status (derived inventory health)
// ==========================================
// Derived from utilization bands; never stored, always recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Adequate,
    Low,
    Critical,
    Excess,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Adequate => "adequate",
            StockStatus::Low => "low",
            StockStatus::Critical => "critical",
            StockStatus::Excess => "excess",
        }
    }
}

// ==========================================
// Recommendation Kind
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Cost,
    Efficiency,
    Capacity,
    Route,
    Priority,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::Cost => "cost",
            RecommendationKind::Efficiency => "efficiency",
            RecommendationKind::Capacity => "capacity",
            RecommendationKind::Route => "route",
            RecommendationKind::Priority => "priority",
        }
    }
}

// ==========================================
// Impact Level
// ==========================================
// Ordered: Low < Medium < High (ranking sorts descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }
}

// ==========================================
// Recommendation State
// ==========================================
// Active -> Implemented | Dismissed; both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationState {
    Active,
    Implemented,
    Dismissed,
}

impl fmt::Display for RecommendationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecommendationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationState::Active => "active",
            RecommendationState::Implemented => "implemented",
            RecommendationState::Dismissed => "dismissed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecommendationState::Active)
    }
}

// ==========================================
// Distance Tier (destination classification)
// ==========================================
// Input to the external freight rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceTier {
    Local,
    Regional,
    National,
    Export,
}

impl fmt::Display for DistanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DistanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceTier::Local => "local",
            DistanceTier::Regional => "regional",
            DistanceTier::National => "national",
            DistanceTier::Export => "export",
        }
    }
}
