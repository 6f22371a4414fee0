//! Out-of-time cross-validation
//!
//! Splits chronologically so that a configured fraction of the most recent
//! instances forms the holdout set. Training never sees data time-ordered
//! after the instances it is validated against.

use super::{CrossValidator, FoldAggregation};
use crate::data::{DateTimeExtractor, Instance};
use crate::error::{Result, TimefoldError};
use crate::loss::{LossFunction, PredictionRecord};
use crate::model::ModelBuilderFactory;
use crate::optimizer::Configuration;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Train/holdout sizes for `n` instances at holdout fraction `fraction`:
/// `round(fraction * n)` most recent instances are held out.
pub fn out_of_time_split(n: usize, fraction: f64) -> (usize, usize) {
    let holdout = (fraction * n as f64).round() as usize;
    (n - holdout.min(n), holdout.min(n))
}

/// Time-aware cross-validator.
///
/// Each fold sorts instances by extracted timestamp, cuts off the tail as
/// holdout, fits on the head, and scores the holdout with the loss
/// function. The first fold uses the configured holdout fraction exactly;
/// later folds jitter the cut point (seeded, deterministic) to vary the
/// split and reduce the variance of the aggregated estimate.
pub struct OutOfTimeCrossValidator {
    loss: Box<dyn LossFunction>,
    extractor: Box<dyn DateTimeExtractor>,
    holdout_fraction: f64,
    n_folds: usize,
    aggregation: FoldAggregation,
    seed: u64,
}

impl OutOfTimeCrossValidator {
    pub fn new(
        loss: Box<dyn LossFunction>,
        extractor: Box<dyn DateTimeExtractor>,
        holdout_fraction: f64,
        n_folds: usize,
    ) -> Self {
        Self {
            loss,
            extractor,
            holdout_fraction,
            n_folds: n_folds.max(1),
            aggregation: FoldAggregation::Mean,
            seed: 42,
        }
    }

    pub fn with_aggregation(mut self, aggregation: FoldAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Indices of `instances` in chronological order. Ties keep the original
    /// relative order so the split is stable.
    fn order_by_time(&self, instances: &[Instance]) -> Result<Vec<usize>> {
        let mut timestamps: Vec<DateTime<Utc>> = Vec::with_capacity(instances.len());
        for (i, instance) in instances.iter().enumerate() {
            let ts = self.extractor.extract(instance).map_err(|e| {
                TimefoldError::TimestampExtraction(format!("instance {}: {}", i, e))
            })?;
            timestamps.push(ts);
        }

        let mut order: Vec<usize> = (0..instances.len()).collect();
        order.sort_by_key(|&i| (timestamps[i], i));
        Ok(order)
    }

    /// Training-set length for each fold. The first fold uses the exact
    /// configured fraction, later folds sample a cut within a window around
    /// it; every cut leaves both sides non-empty.
    fn fold_train_lengths(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let (base_train, _) = out_of_time_split(n, self.holdout_fraction);

        (0..self.n_folds)
            .map(|fold| {
                let holdout = if fold == 0 {
                    n - base_train
                } else {
                    let lo = ((0.5 * self.holdout_fraction * n as f64).round() as usize).max(1);
                    let hi = ((1.5 * self.holdout_fraction * n as f64).round() as usize)
                        .min(n - 1)
                        .max(lo);
                    rng.gen_range(lo..=hi)
                };
                n - holdout
            })
            .collect()
    }
}

impl CrossValidator for OutOfTimeCrossValidator {
    fn evaluate(
        &self,
        factory: &dyn ModelBuilderFactory,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<f64> {
        if !(0.0..1.0).contains(&self.holdout_fraction) || self.holdout_fraction == 0.0 {
            return Err(TimefoldError::ValidationError(format!(
                "holdout fraction must be in (0, 1), got {}",
                self.holdout_fraction
            )));
        }

        let n = instances.len();
        let (base_train, base_holdout) = out_of_time_split(n, self.holdout_fraction);
        if base_train == 0 || base_holdout == 0 {
            return Err(TimefoldError::InsufficientData(format!(
                "{} instances cannot be split at holdout fraction {}",
                n, self.holdout_fraction
            )));
        }

        let order = self.order_by_time(instances)?;

        // Fresh RNG per evaluation so repeated calls see identical folds
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let train_lengths = self.fold_train_lengths(n, &mut rng);

        let mut fold_losses = Vec::with_capacity(self.n_folds);
        for (fold, &train_len) in train_lengths.iter().enumerate() {
            let training: Vec<Instance> = order[..train_len]
                .iter()
                .map(|&i| instances[i].clone())
                .collect();

            let model = factory.build(configuration, &training)?;

            let mut predictions = Vec::with_capacity(n - train_len);
            for &i in &order[train_len..] {
                let instance = &instances[i];
                let score = model.predict(instance.attributes())?;
                predictions.push(PredictionRecord::new(
                    score,
                    instance.label().clone(),
                    instance.weight(),
                ));
            }

            let fold_loss = self.loss.score(&predictions)?;
            debug!(fold, train = train_len, holdout = n - train_len, fold_loss);
            fold_losses.push(fold_loss);
        }

        Ok(self.aggregation.aggregate(&fold_losses))
    }
}
