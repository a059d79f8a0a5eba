//! Configuration file support.
//!
//! A `softlogic.toml` holds one table per layer:
//!
//! ```toml
//! [admm]
//! max_iterations = 5000
//! step_size = 1.0
//!
//! [inference]
//! initial_value = "Atom"
//! lazy_threshold = 0.01
//!
//! [grounding]
//! parallel = true
//! ```
//!
//! Missing keys fall back to their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use softlogic_reasoner::{AdmmConfig, InitialValue};

use crate::{SoftLogicError, SoftLogicResult};

/// Environment variable pointing at a configuration file.
pub const CONFIG_ENV: &str = "SOFTLOGIC_CONFIG";
/// File looked up in the current directory.
pub const CONFIG_FILE: &str = "softlogic.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftLogicConfig {
    pub admm: AdmmConfig,
    pub inference: InferenceConfig,
    pub grounding: GroundingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Starting point of the consensus variables.
    pub initial_value: InitialValue,
    /// Seed for [`InitialValue::Random`].
    pub seed: u64,
    /// Replace hard constraints with heavily weighted rules before grounding.
    pub relax_hard_constraints: bool,
    /// Relaxed weight as a multiple of the largest rule weight.
    pub relaxation_multiplier: f64,
    /// Square the relaxed rules.
    pub relax_squared: bool,
    /// Lazy atoms above this value are activated between rounds.
    pub lazy_threshold: f64,
    /// Upper bound on lazy activation rounds.
    pub lazy_max_rounds: usize,
    /// Commit values to the database after inference.
    pub commit: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            initial_value: InitialValue::Atom,
            seed: 0,
            relax_hard_constraints: false,
            relaxation_multiplier: 100.0,
            relax_squared: true,
            lazy_threshold: 0.01,
            lazy_max_rounds: 100,
            commit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundingConfig {
    /// Run grounding queries in parallel.
    pub parallel: bool,
    /// Cap on DNF clauses when a rule formula is normalized.
    pub max_dnf_clauses: usize,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_dnf_clauses: softlogic_ir::DEFAULT_MAX_DNF_CLAUSES,
        }
    }
}

impl SoftLogicConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Find and load a configuration file.
    ///
    /// Search order:
    /// 1. `SOFTLOGIC_CONFIG` environment variable
    /// 2. `softlogic.toml` in the current directory
    ///
    /// Falls back to the defaults when neither loads.
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            match Self::load(Path::new(&path)) {
                Ok(config) => return config,
                Err(e) => log::warn!("ignoring {}: {:#}", CONFIG_ENV, e),
            }
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            match Self::load(&local) {
                Ok(config) => return config,
                Err(e) => log::warn!("ignoring {}: {:#}", CONFIG_FILE, e),
            }
        }
        Self::default()
    }

    pub fn validate(&self) -> SoftLogicResult<()> {
        self.admm.validate()?;
        let inference = &self.inference;
        if !(0.0..=1.0).contains(&inference.lazy_threshold) {
            return Err(SoftLogicError::Config(format!(
                "lazy_threshold must be in [0, 1], got {}",
                inference.lazy_threshold
            )));
        }
        if !(inference.relaxation_multiplier.is_finite() && inference.relaxation_multiplier > 0.0) {
            return Err(SoftLogicError::Config(format!(
                "relaxation_multiplier must be positive, got {}",
                inference.relaxation_multiplier
            )));
        }
        if self.grounding.max_dnf_clauses == 0 {
            return Err(SoftLogicError::Config("max_dnf_clauses must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SoftLogicConfig::default();
        assert_eq!(config.admm.max_iterations, 25_000);
        assert_eq!(config.inference.initial_value, InitialValue::Atom);
        assert!(config.grounding.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = SoftLogicConfig::default();
        config.admm.step_size = 0.5;
        config.inference.lazy_max_rounds = 3;
        config.save(&path).unwrap();

        let loaded = SoftLogicConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file() {
        let config: SoftLogicConfig = toml::from_str("[inference]\nlazy_threshold = 0.2\n").unwrap();
        assert_eq!(config.inference.lazy_threshold, 0.2);
        assert_eq!(config.inference.lazy_max_rounds, 100);
        assert_eq!(config.admm, AdmmConfig::default());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = SoftLogicConfig::load(Path::new("/nonexistent/softlogic.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = SoftLogicConfig::default();
        config.inference.lazy_threshold = 1.5;
        assert!(matches!(config.validate(), Err(SoftLogicError::Config(_))));
    }
}
