//! Loss functions for scoring holdout predictions

mod weighted_auc;

pub use weighted_auc::WeightedAucLoss;

use crate::data::Label;
use crate::error::Result;

/// One scored holdout instance.
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    /// Model output; higher means more likely positive
    pub score: f64,
    /// Ground-truth label
    pub label: Label,
    /// Instance weight
    pub weight: f64,
}

impl PredictionRecord {
    pub fn new(score: f64, label: Label, weight: f64) -> Self {
        Self {
            score,
            label,
            weight,
        }
    }
}

/// Scores a set of (prediction, label, weight) triples into a single scalar.
/// Lower is better.
pub trait LossFunction: Send + Sync {
    fn score(&self, predictions: &[PredictionRecord]) -> Result<f64>;
}
