//! Majority-class downsampling decorator
//!
//! Wraps another factory: before delegating the fit, negatives are sampled
//! down until the positive class reaches a target proportion of the
//! training set, and predicted probabilities are corrected for the sampling
//! rate afterwards. Ranking metrics are unaffected by the monotone
//! correction; calibrated consumers see honest probabilities.

use super::{ModelBuilderFactory, PredictiveModel};
use crate::data::{AttributesMap, Instance, Label};
use crate::error::{Result, TimefoldError};
use crate::optimizer::{Configuration, SearchSpace};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Decorator factory that downsamples the negative class.
pub struct DownsamplingFactory {
    inner: Box<dyn ModelBuilderFactory>,
    positive_label: Label,
    seed: u64,
    name: String,
}

impl DownsamplingFactory {
    pub fn new(inner: Box<dyn ModelBuilderFactory>) -> Self {
        let name = format!("downsampled-{}", inner.name());
        Self {
            inner,
            positive_label: Label::Boolean(true),
            seed: 42,
            name,
        }
    }

    pub fn with_positive_label(mut self, label: Label) -> Self {
        self.positive_label = label;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl ModelBuilderFactory for DownsamplingFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_space(&self) -> SearchSpace {
        self.inner.parameter_space().merge(SearchSpace::new().discrete(
            "target_minority_proportion",
            [0.1.into(), 0.2.into(), 0.3.into(), 0.5.into()],
        ))
    }

    fn build(
        &self,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<Box<dyn PredictiveModel>> {
        let target = configuration
            .get_float("target_minority_proportion")
            .unwrap_or(0.2);
        if !(0.0..1.0).contains(&target) || target == 0.0 {
            return Err(TimefoldError::ValidationError(format!(
                "target_minority_proportion must be in (0, 1), got {}",
                target
            )));
        }

        let positives = instances
            .iter()
            .filter(|i| i.label().binary_indicator(&self.positive_label) > 0.5)
            .count();
        let negatives = instances.len() - positives;

        let proportion = positives as f64 / instances.len().max(1) as f64;
        if positives == 0 || negatives == 0 || proportion >= target {
            // Nothing to downsample; delegate untouched
            let model = self.inner.build(configuration, instances)?;
            return Ok(Box::new(DownsampledModel {
                inner: model,
                keep_rate: 1.0,
            }));
        }

        // Keep this fraction of negatives so positives reach `target`
        let keep_rate =
            (positives as f64 * (1.0 - target)) / (target * negatives as f64);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut kept_negatives = 0usize;
        let mut downsampled: Vec<Instance> = instances
            .iter()
            .filter(|i| {
                if i.label().binary_indicator(&self.positive_label) > 0.5 {
                    true
                } else if rng.gen_bool(keep_rate) {
                    kept_negatives += 1;
                    true
                } else {
                    false
                }
            })
            .cloned()
            .collect();

        if kept_negatives == 0 {
            // Degenerate sample; keep one negative so the fit stays two-class
            if let Some(negative) = instances
                .iter()
                .find(|i| i.label().binary_indicator(&self.positive_label) <= 0.5)
            {
                downsampled.push(negative.clone());
            }
        }

        debug!(
            total = instances.len(),
            kept = downsampled.len(),
            keep_rate,
            "downsampled negatives before delegating fit"
        );

        let model = self.inner.build(configuration, &downsampled)?;
        Ok(Box::new(DownsampledModel {
            inner: model,
            keep_rate,
        }))
    }
}

/// Corrects the inner model's probabilities for negative downsampling.
struct DownsampledModel {
    inner: Box<dyn PredictiveModel>,
    keep_rate: f64,
}

impl PredictiveModel for DownsampledModel {
    fn predict(&self, attributes: &AttributesMap) -> Result<f64> {
        let p = self.inner.predict(attributes)?;
        if self.keep_rate >= 1.0 {
            return Ok(p);
        }
        let denominator = p + (1.0 - p) / self.keep_rate;
        if denominator <= 0.0 {
            return Ok(0.0);
        }
        Ok(p / denominator)
    }
}
