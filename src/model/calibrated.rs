//! PAV-calibrated decorator
//!
//! Wraps another factory: after the inner model is fitted, a weighted
//! pool-adjacent-violators (PAV) isotonic regression is fitted from the
//! inner model's raw training scores to observed outcomes, and predictions
//! are passed through the resulting monotone step function.

use super::{ModelBuilderFactory, PredictiveModel};
use crate::data::{AttributesMap, Instance, Label};
use crate::error::{Result, TimefoldError};
use crate::optimizer::{Configuration, SearchSpace};
use serde::{Deserialize, Serialize};

/// Weighted isotonic score-to-probability mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PavCalibrator {
    x_values: Vec<f64>,
    y_values: Vec<f64>,
}

impl PavCalibrator {
    /// Fit on (score, target, weight) triples; targets are 0/1 indicators.
    pub fn fit(scores: &[f64], targets: &[f64], weights: &[f64]) -> Result<Self> {
        if scores.is_empty() {
            return Err(TimefoldError::InsufficientData(
                "cannot calibrate on an empty training set".to_string(),
            ));
        }
        if scores.len() != targets.len() || scores.len() != weights.len() {
            return Err(TimefoldError::ShapeError {
                expected: format!("{} targets and weights", scores.len()),
                actual: format!("{} targets, {} weights", targets.len(), weights.len()),
            });
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

        let x_sorted: Vec<f64> = order.iter().map(|&i| scores[i]).collect();
        let y_sorted: Vec<f64> = order.iter().map(|&i| targets[i]).collect();
        let w_sorted: Vec<f64> = order.iter().map(|&i| weights[i].max(0.0)).collect();

        let y_isotonic = Self::pava(&y_sorted, &w_sorted);
        Ok(Self {
            x_values: x_sorted,
            y_values: y_isotonic,
        })
    }

    /// Pool Adjacent Violators: weighted merge of out-of-order pools.
    fn pava(y: &[f64], weights: &[f64]) -> Vec<f64> {
        let n = y.len();
        let mut result = y.to_vec();
        let mut w = weights.to_vec();

        let mut i = 0;
        while i + 1 < n {
            if result[i] > result[i + 1] {
                let total = w[i] + w[i + 1];
                let merged = if total > 0.0 {
                    (result[i] * w[i] + result[i + 1] * w[i + 1]) / total
                } else {
                    (result[i] + result[i + 1]) / 2.0
                };
                result[i] = merged;
                result[i + 1] = merged;
                w[i] = total;
                w[i + 1] = total;

                // Restore isotonicity behind the merge point
                let mut j = i;
                while j > 0 && result[j - 1] > result[j] {
                    let total = w[j - 1] + w[j];
                    let merged = if total > 0.0 {
                        (result[j - 1] * w[j - 1] + result[j] * w[j]) / total
                    } else {
                        (result[j - 1] + result[j]) / 2.0
                    };
                    result[j - 1] = merged;
                    result[j] = merged;
                    w[j - 1] = total;
                    w[j] = total;
                    j -= 1;
                }
            }
            i += 1;
        }

        result
    }

    /// Calibrated probability for a raw score, linearly interpolated between
    /// fitted points and clamped to the fitted range at the extremes. An
    /// empty calibrator (reachable only through deserialization; `fit`
    /// rejects empty input) passes scores through unchanged.
    pub fn calibrate(&self, score: f64) -> f64 {
        let x = &self.x_values;
        let y = &self.y_values;

        if x.is_empty() || y.len() != x.len() {
            return score.clamp(0.0, 1.0);
        }
        let last = x.len() - 1;
        if score <= x[0] {
            return y[0].clamp(0.0, 1.0);
        }
        if score >= x[last] {
            return y[last].clamp(0.0, 1.0);
        }

        let mut lo = 0;
        let mut hi = x.len() - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if x[mid] <= score {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        if (x[hi] - x[lo]).abs() < 1e-12 {
            return y[lo].clamp(0.0, 1.0);
        }
        let t = (score - x[lo]) / (x[hi] - x[lo]);
        (y[lo] + t * (y[hi] - y[lo])).clamp(0.0, 1.0)
    }
}

/// Decorator factory producing PAV-calibrated models.
pub struct PavCalibratedFactory {
    inner: Box<dyn ModelBuilderFactory>,
    positive_label: Label,
    name: String,
}

impl PavCalibratedFactory {
    pub fn new(inner: Box<dyn ModelBuilderFactory>) -> Self {
        let name = format!("pav-calibrated-{}", inner.name());
        Self {
            inner,
            positive_label: Label::Boolean(true),
            name,
        }
    }

    pub fn with_positive_label(mut self, label: Label) -> Self {
        self.positive_label = label;
        self
    }
}

impl ModelBuilderFactory for PavCalibratedFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_space(&self) -> SearchSpace {
        // Calibration adds no searchable parameters
        self.inner.parameter_space()
    }

    fn build(
        &self,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<Box<dyn PredictiveModel>> {
        let model = self.inner.build(configuration, instances)?;

        let mut scores = Vec::with_capacity(instances.len());
        for instance in instances {
            scores.push(model.predict(instance.attributes())?);
        }
        let targets: Vec<f64> = instances
            .iter()
            .map(|i| i.label().binary_indicator(&self.positive_label))
            .collect();
        let weights: Vec<f64> = instances.iter().map(|i| i.weight()).collect();

        let calibrator = PavCalibrator::fit(&scores, &targets, &weights)?;
        Ok(Box::new(CalibratedModel {
            inner: model,
            calibrator,
        }))
    }
}

struct CalibratedModel {
    inner: Box<dyn PredictiveModel>,
    calibrator: PavCalibrator,
}

impl PredictiveModel for CalibratedModel {
    fn predict(&self, attributes: &AttributesMap) -> Result<f64> {
        let raw = self.inner.predict(attributes)?;
        Ok(self.calibrator.calibrate(raw))
    }
}
