//! Optimizer configuration

use serde::{Deserialize, Serialize};

/// Configuration for the hyperparameter search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Full passes over the parameter list before giving up on improvement
    pub max_sweeps: usize,

    /// Hard budget on cross-validation evaluations
    pub max_trials: usize,

    /// Wall-clock budget in seconds, checked between trials
    pub timeout_secs: Option<f64>,

    /// Minimum loss decrease that counts as an improvement
    pub min_improvement: f64,

    /// Failed trials tolerated before the search aborts
    pub max_failures: usize,

    /// Worker threads for candidate evaluation; values above 1 run trials
    /// on a dedicated pool of this size, 1 runs serially
    pub n_jobs: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_sweeps: 8,
            max_trials: 1000,
            timeout_secs: None,
            min_improvement: 1e-9,
            max_failures: 0,
            n_jobs: 1,
        }
    }
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the sweep limit
    pub fn with_max_sweeps(mut self, n: usize) -> Self {
        self.max_sweeps = n.max(1);
        self
    }

    /// Builder method to set the trial budget
    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = n.max(1);
        self
    }

    /// Builder method to set the wall-clock budget
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Builder method to set the improvement tolerance
    pub fn with_min_improvement(mut self, tolerance: f64) -> Self {
        self.min_improvement = tolerance.max(0.0);
        self
    }

    /// Builder method to set the tolerated failure count
    pub fn with_max_failures(mut self, n: usize) -> Self {
        self.max_failures = n;
        self
    }

    /// Builder method to enable parallel candidate evaluation
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.max_failures, 0);
        assert_eq!(config.n_jobs, 1);
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_builder() {
        let config = OptimizerConfig::new()
            .with_max_sweeps(3)
            .with_max_trials(50)
            .with_max_failures(2)
            .with_n_jobs(4);

        assert_eq!(config.max_sweeps, 3);
        assert_eq!(config.max_trials, 50);
        assert_eq!(config.max_failures, 2);
        assert_eq!(config.n_jobs, 4);
    }
}
