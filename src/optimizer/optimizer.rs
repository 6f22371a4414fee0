//! Greedy coordinate-descent search over a builder factory's parameter space
//!
//! Each sweep walks the parameters in declaration order and, for one
//! parameter at a time, cross-validates every candidate value with the
//! others held fixed. The best-seen (configuration, loss) is tracked
//! monotonically; ties break toward the earlier-enumerated candidate, so
//! the outcome never depends on parallel completion order.

use super::config::OptimizerConfig;
use super::search_space::Configuration;
use crate::crossval::CrossValidator;
use crate::data::Instance;
use crate::error::{Result, TimefoldError};
use crate::model::ModelBuilderFactory;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One completed evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub configuration: Configuration,
    pub loss: f64,
}

/// Outcome of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimum {
    /// Best configuration found
    pub configuration: Configuration,
    /// Its cross-validated loss
    pub loss: f64,
    /// Every successful evaluation, in the order it was considered
    pub trials: Vec<EvaluationRecord>,
    /// Trials that failed and were tolerated
    pub n_failures: usize,
}

/// A factory's identity together with its search outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedOptimum {
    pub factory: String,
    pub optimum: Optimum,
}

/// Drives the search; holds only the search configuration, so one optimizer
/// can serve many factories.
pub struct PredictiveModelOptimizer {
    config: OptimizerConfig,
}

impl Default for PredictiveModelOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl PredictiveModelOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Search the factory's parameter space for the configuration with the
    /// lowest cross-validated loss.
    pub fn optimize(
        &self,
        factory: &dyn ModelBuilderFactory,
        instances: &[Instance],
        validator: &dyn CrossValidator,
    ) -> Result<Optimum> {
        let space = factory.parameter_space();
        if space.is_empty() {
            return Err(TimefoldError::EmptySearchSpace);
        }
        let mut current = space
            .default_configuration()
            .ok_or(TimefoldError::EmptySearchSpace)?;

        let mut state = SearchState::new(&self.config)?;

        // The starting point is a trial like any other
        let mut current_loss = state
            .evaluate(factory, validator, instances, &[current.clone()])?
            .into_iter()
            .next()
            .flatten();

        'sweeps: for sweep in 0..self.config.max_sweeps {
            let mut improved = false;

            for parameter in space.parameters() {
                if state.exhausted() {
                    break 'sweeps;
                }
                let values = parameter.domain.values();
                if values.len() <= 1 {
                    continue;
                }

                let candidates: Vec<Configuration> = values
                    .iter()
                    .map(|value| current.clone().with(parameter.name.clone(), value.clone()))
                    .collect();
                let losses = state.evaluate(factory, validator, instances, &candidates)?;

                // Earliest-enumerated minimum wins
                let mut chosen: Option<(usize, f64)> = None;
                for (i, loss) in losses.iter().enumerate() {
                    if let Some(loss) = loss {
                        if chosen.map_or(true, |(_, l)| *loss < l) {
                            chosen = Some((i, *loss));
                        }
                    }
                }

                if let Some((i, loss)) = chosen {
                    let accept = match current_loss {
                        None => true,
                        Some(cl) => loss + self.config.min_improvement < cl,
                    };
                    if accept {
                        debug!(
                            sweep,
                            parameter = parameter.name.as_str(),
                            value = %values[i],
                            loss,
                            "moved to better candidate"
                        );
                        current = candidates[i].clone();
                        current_loss = Some(loss);
                        improved = true;
                    }
                }
            }

            if !improved {
                debug!(sweep, "no parameter improved; search converged");
                break;
            }
        }

        state.into_optimum(factory.name())
    }

    /// Re-evaluate one configuration without searching. `optimize` and this
    /// agree: the returned optimum's loss equals `loss_of` of its
    /// configuration.
    pub fn loss_of(
        &self,
        factory: &dyn ModelBuilderFactory,
        configuration: &Configuration,
        instances: &[Instance],
        validator: &dyn CrossValidator,
    ) -> Result<f64> {
        validator.evaluate(factory, configuration, instances)
    }

    /// Optimize several factories and rank them by best loss, ascending.
    /// The sort is stable, so equal losses keep the caller's factory order.
    pub fn rank(
        &self,
        factories: &[&dyn ModelBuilderFactory],
        instances: &[Instance],
        validator: &dyn CrossValidator,
    ) -> Result<Vec<RankedOptimum>> {
        let mut ranked = Vec::with_capacity(factories.len());
        for factory in factories {
            let optimum = self.optimize(*factory, instances, validator)?;
            info!(
                factory = factory.name(),
                loss = optimum.loss,
                configuration = %optimum.configuration,
                "factory optimized"
            );
            ranked.push(RankedOptimum {
                factory: factory.name().to_string(),
                optimum,
            });
        }
        ranked.sort_by(|a, b| a.optimum.loss.total_cmp(&b.optimum.loss));
        Ok(ranked)
    }
}

/// Bookkeeping shared by all trials of one search.
struct SearchState<'a> {
    config: &'a OptimizerConfig,
    cache: HashMap<String, f64>,
    trials: Vec<EvaluationRecord>,
    n_evaluations: usize,
    n_failures: usize,
    started: Instant,
    /// Dedicated pool of `n_jobs` workers; `None` runs serially
    pool: Option<rayon::ThreadPool>,
}

impl<'a> SearchState<'a> {
    fn new(config: &'a OptimizerConfig) -> Result<Self> {
        let pool = if config.n_jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.n_jobs)
                .build()
                .map_err(|e| {
                    TimefoldError::OptimizationFailed(format!(
                        "could not start {} evaluation workers: {}",
                        config.n_jobs, e
                    ))
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            config,
            cache: HashMap::new(),
            trials: Vec::new(),
            n_evaluations: 0,
            n_failures: 0,
            started: Instant::now(),
            pool,
        })
    }

    fn exhausted(&self) -> bool {
        if self.n_evaluations >= self.config.max_trials {
            return true;
        }
        match self.config.timeout_secs {
            Some(budget) => self.started.elapsed().as_secs_f64() > budget,
            None => false,
        }
    }

    /// Evaluate a batch of candidates, consulting the cache first. Cache
    /// misses run in parallel when configured; results are folded back in
    /// candidate order so the search stays deterministic. `None` marks a
    /// candidate skipped for budget reasons or failed within tolerance.
    fn evaluate(
        &mut self,
        factory: &dyn ModelBuilderFactory,
        validator: &dyn CrossValidator,
        instances: &[Instance],
        candidates: &[Configuration],
    ) -> Result<Vec<Option<f64>>> {
        let mut results: Vec<Option<f64>> = vec![None; candidates.len()];

        let mut to_run: Vec<usize> = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            match self.cache.get(&candidate.canonical_key()) {
                Some(&loss) => results[i] = Some(loss),
                None => to_run.push(i),
            }
        }

        let budget = self.config.max_trials.saturating_sub(self.n_evaluations);
        if to_run.len() > budget {
            warn!(
                skipped = to_run.len() - budget,
                "trial budget exhausted; skipping remaining candidates"
            );
            to_run.truncate(budget);
        }
        if self.exhausted() {
            return Ok(results);
        }

        let outcomes: Vec<(usize, Result<f64>)> = match &self.pool {
            Some(pool) => pool.install(|| {
                to_run
                    .par_iter()
                    .map(|&i| (i, validator.evaluate(factory, &candidates[i], instances)))
                    .collect()
            }),
            None => to_run
                .iter()
                .map(|&i| (i, validator.evaluate(factory, &candidates[i], instances)))
                .collect(),
        };
        self.n_evaluations += outcomes.len();

        // Single-writer reduction: parallel outcomes are committed here, in
        // candidate order
        for (i, outcome) in outcomes {
            let candidate = &candidates[i];
            match outcome {
                Ok(loss) => {
                    self.cache.insert(candidate.canonical_key(), loss);
                    self.trials.push(EvaluationRecord {
                        configuration: candidate.clone(),
                        loss,
                    });
                    results[i] = Some(loss);
                }
                Err(error) => {
                    self.n_failures += 1;
                    warn!(configuration = %candidate, %error, "trial failed");
                    if self.n_failures > self.config.max_failures {
                        return Err(TimefoldError::OptimizationFailed(format!(
                            "configuration {} failed cross-validation ({} of {} tolerated failures used): {}",
                            candidate, self.n_failures, self.config.max_failures, error
                        )));
                    }
                }
            }
        }

        Ok(results)
    }

    /// Fold the trial log into the final optimum: strict minimum by loss,
    /// first-encountered on ties.
    fn into_optimum(self, factory_name: &str) -> Result<Optimum> {
        let mut best: Option<(Configuration, f64)> = None;
        for record in &self.trials {
            let better = match &best {
                None => true,
                Some((_, loss)) => record.loss < *loss,
            };
            if better {
                best = Some((record.configuration.clone(), record.loss));
            }
        }

        match best {
            Some((configuration, loss)) => {
                info!(
                    factory = factory_name,
                    loss,
                    trials = self.trials.len(),
                    failures = self.n_failures,
                    "search finished"
                );
                Ok(Optimum {
                    configuration,
                    loss,
                    trials: self.trials,
                    n_failures: self.n_failures,
                })
            }
            None => Err(TimefoldError::OptimizationFailed(format!(
                "no trial succeeded for factory '{}' ({} failures)",
                factory_name, self.n_failures
            ))),
        }
    }
}
