// ==========================================
// Rake Formation DSS - Configuration Manager
// ==========================================
// Loads EngineConfig from a JSON file, serves consistent copies to
// the engines, and snapshots the active thresholds so an evaluation
// cycle can record what it ran with.
// ==========================================

use crate::config::engine_config::{EngineConfig, StatusBands};
use anyhow::Context;
use std::path::Path;
use std::sync::RwLock;

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    config: RwLock<EngineConfig>,
}

impl ConfigManager {
    /// Manager seeded with built-in defaults.
    pub fn new() -> Self {
        Self {
            config: RwLock::new(EngineConfig::default()),
        }
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Load from a JSON file. Missing keys fall back to defaults
    /// (`EngineConfig` uses `#[serde(default)]`).
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        tracing::info!(path = %path.display(), "engine config loaded");
        Ok(Self::with_config(config))
    }

    /// Consistent copy of the active configuration.
    pub fn current(&self) -> EngineConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Apply a programmatic override (operator tuning).
    pub fn apply<F>(&self, mutate: F)
    where
        F: FnOnce(&mut EngineConfig),
    {
        let mut guard = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        mutate(&mut guard);
        tracing::info!("engine config updated");
    }

    /// Bands for a material type, honoring per-type overrides.
    pub fn bands_for(&self, material_type: &str) -> StatusBands {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .bands_for(material_type)
    }

    /// JSON snapshot of the active thresholds, recorded by evaluation
    /// cycles for explainability.
    pub fn snapshot_json(&self) -> anyhow::Result<String> {
        let config = self.current();
        serde_json::to_string(&config).context("failed to serialize config snapshot")
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
