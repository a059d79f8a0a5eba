//! ADMM configuration.

use serde::{Deserialize, Serialize};

use crate::{ReasonerError, ReasonerResult};

/// Parameters of the ADMM reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmmConfig {
    /// Iteration cap before the budget is applied.
    pub max_iterations: usize,
    /// Penalty parameter ρ of the augmented Lagrangian.
    pub step_size: f64,
    /// Absolute residual tolerance.
    pub epsilon_abs: f64,
    /// Relative residual tolerance.
    pub epsilon_rel: f64,
    /// Iterations between objective snapshots.
    pub compute_period: usize,
    /// Ignore convergence and run every allowed iteration.
    pub run_full_iterations: bool,
    /// Stop when the objective stops changing between snapshots.
    pub objective_break: bool,
    /// Objective change considered "unchanged" by the objective break.
    pub tolerance: f64,
    /// Violation above which a hard constraint counts as violated.
    pub constraint_tolerance: f64,
    /// Worker threads (0 = rayon's global pool).
    pub num_threads: usize,
    /// Terms or variables per parallel work block.
    pub block_size: usize,
}

impl Default for AdmmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25_000,
            step_size: 1.0,
            epsilon_abs: 1e-5,
            epsilon_rel: 1e-3,
            compute_period: 50,
            run_full_iterations: false,
            objective_break: true,
            tolerance: 1e-5,
            constraint_tolerance: 1e-3,
            num_threads: 0,
            block_size: 1024,
        }
    }
}

impl AdmmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_epsilons(mut self, epsilon_abs: f64, epsilon_rel: f64) -> Self {
        self.epsilon_abs = epsilon_abs;
        self.epsilon_rel = epsilon_rel;
        self
    }

    pub fn with_compute_period(mut self, compute_period: usize) -> Self {
        self.compute_period = compute_period;
        self
    }

    pub fn with_run_full_iterations(mut self, enabled: bool) -> Self {
        self.run_full_iterations = enabled;
        self
    }

    pub fn with_objective_break(mut self, enabled: bool) -> Self {
        self.objective_break = enabled;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn validate(&self) -> ReasonerResult<()> {
        let fail = |msg: String| Err(ReasonerError::InvalidConfig(msg));
        if self.max_iterations == 0 {
            return fail("max_iterations must be positive".to_string());
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return fail(format!("step_size must be positive, got {}", self.step_size));
        }
        for (name, value) in [
            ("epsilon_abs", self.epsilon_abs),
            ("epsilon_rel", self.epsilon_rel),
            ("tolerance", self.tolerance),
            ("constraint_tolerance", self.constraint_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return fail(format!("{} must be non-negative, got {}", name, value));
            }
        }
        if self.compute_period == 0 {
            return fail("compute_period must be positive".to_string());
        }
        if self.block_size == 0 {
            return fail("block_size must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AdmmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 25_000);
        assert_eq!(config.compute_period, 50);
    }

    #[test]
    fn test_builder() {
        let config = AdmmConfig::new()
            .with_max_iterations(10)
            .with_step_size(2.0)
            .with_num_threads(2);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.step_size, 2.0);
        assert_eq!(config.num_threads, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AdmmConfig::new().with_step_size(0.0).validate().is_err());
        assert!(AdmmConfig::new().with_max_iterations(0).validate().is_err());
        assert!(AdmmConfig::new().with_compute_period(0).validate().is_err());
        assert!(AdmmConfig::new().with_epsilons(-1.0, 0.0).validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AdmmConfig = toml::from_str("max_iterations = 100\nstep_size = 0.5").unwrap();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.step_size, 0.5);
        assert_eq!(config.compute_period, 50);
    }
}
