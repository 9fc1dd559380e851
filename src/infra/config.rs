// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used for all three agent roles unless overridden below.
    pub model: Option<String>,
    pub generator: Option<String>,
    pub reflector: Option<String>,
    pub curator: Option<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            model: Some("claude-sonnet-4-20250514".into()),
            generator: None,
            reflector: None,
            curator: None,
        }
    }
}

impl ModelsConfig {
    pub fn generator_model(&self) -> String {
        self.resolve(&self.generator)
    }

    pub fn reflector_model(&self) -> String {
        self.resolve(&self.reflector)
    }

    pub fn curator_model(&self) -> String {
        self.resolve(&self.curator)
    }

    fn resolve(&self, role: &Option<String>) -> String {
        role.clone()
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| "claude-sonnet-4-20250514".into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub max_epochs: u32,
    pub plateau_threshold: f64,
    pub plateau_patience: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 10,
            plateau_threshold: 0.01,
            plateau_patience: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// A running run with no heartbeat for this long is considered orphaned.
    pub heartbeat_stale_secs: u64,
    /// Wall-clock budget for a single run.
    pub run_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            heartbeat_stale_secs: 300,
            run_timeout_secs: 86_400,
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    /// if no config.toml exists.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.training.max_epochs, 10);
        assert_eq!(config.training.plateau_patience, 3);
        assert_eq!(config.recovery.heartbeat_stale_secs, 300);
        assert_eq!(config.recovery.run_timeout_secs, 86_400);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            "[training]\nmax_epochs = 5\nplateau_threshold = 0.02\nplateau_patience = 2\n",
        )
        .unwrap();
        assert_eq!(config.training.max_epochs, 5);
        assert_eq!(config.recovery.heartbeat_stale_secs, 300);
    }

    #[test]
    fn role_model_overrides() {
        let config: Config = toml::from_str(
            "[models]\nmodel = \"claude-sonnet-4-20250514\"\ncurator = \"claude-opus-4-20250514\"\n",
        )
        .unwrap();
        assert_eq!(config.models.generator_model(), "claude-sonnet-4-20250514");
        assert_eq!(config.models.curator_model(), "claude-opus-4-20250514");
    }
}
