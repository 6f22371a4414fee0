//! Cross-validation of candidate configurations

mod out_of_time;

pub use out_of_time::{out_of_time_split, OutOfTimeCrossValidator};

use crate::data::Instance;
use crate::error::Result;
use crate::model::ModelBuilderFactory;
use crate::optimizer::Configuration;
use serde::{Deserialize, Serialize};

/// How per-fold losses are combined into the returned scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FoldAggregation {
    /// Unweighted arithmetic mean
    Mean,
    /// Median, for robustness against a single pathological fold
    Median,
}

impl FoldAggregation {
    pub(crate) fn aggregate(&self, losses: &[f64]) -> f64 {
        match self {
            FoldAggregation::Mean => losses.iter().sum::<f64>() / losses.len() as f64,
            FoldAggregation::Median => {
                let mut sorted = losses.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        }
    }
}

/// Produces a scalar loss estimate for one candidate configuration by
/// carving train/holdout splits, fitting via the factory, and scoring the
/// holdout with a loss function. Implementations never mutate `instances`.
pub trait CrossValidator: Send + Sync {
    fn evaluate(
        &self,
        factory: &dyn ModelBuilderFactory,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<f64>;
}
