//! Weighted AUC ranking loss

use super::{LossFunction, PredictionRecord};
use crate::data::Label;
use crate::error::{Result, TimefoldError};
use tracing::warn;

/// Loss derived from the weighted Area Under the ROC Curve.
///
/// Labels are reduced to a binary indicator relative to a designated
/// positive label. Each instance contributes its weight to the
/// true-positive/false-positive accumulation rather than a unit count, so
/// the loss is invariant under a global positive rescaling of all weights
/// and equals the unweighted AUC when all weights agree.
///
/// Tied scores are treated as a single aggregated step (average-rank
/// method); the result does not depend on how a sort happens to order them.
///
/// Returns `(1 - auc)^exponent`, so lower is better and a perfect separator
/// scores 0. A holdout set containing only one class has no defined AUC;
/// the sentinel AUC 0.5 is used and a warning is logged.
#[derive(Debug, Clone)]
pub struct WeightedAucLoss {
    exponent: f64,
    positive_label: Label,
}

impl Default for WeightedAucLoss {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl WeightedAucLoss {
    pub fn new(exponent: f64) -> Self {
        Self {
            exponent,
            positive_label: Label::Boolean(true),
        }
    }

    /// Designate which label counts as the positive class.
    pub fn with_positive_label(mut self, label: Label) -> Self {
        self.positive_label = label;
        self
    }

    /// Weighted AUC over the records, or `None` if only one class is present.
    fn weighted_auc(&self, predictions: &[PredictionRecord]) -> Option<f64> {
        let mut records: Vec<(f64, f64, bool)> = predictions
            .iter()
            .map(|r| {
                (
                    r.score,
                    r.weight,
                    r.label.binary_indicator(&self.positive_label) > 0.5,
                )
            })
            .collect();
        records.sort_by(|a, b| a.0.total_cmp(&b.0));

        let positive_total: f64 = records.iter().filter(|r| r.2).map(|r| r.1).sum();
        let negative_total: f64 = records.iter().filter(|r| !r.2).map(|r| r.1).sum();
        if positive_total <= 0.0 || negative_total <= 0.0 {
            return None;
        }

        // Mann-Whitney statistic with half credit inside tie groups
        let mut area = 0.0;
        let mut negatives_below = 0.0;
        let mut i = 0;
        while i < records.len() {
            let mut j = i;
            let mut group_positive = 0.0;
            let mut group_negative = 0.0;
            while j < records.len() && records[j].0 == records[i].0 {
                if records[j].2 {
                    group_positive += records[j].1;
                } else {
                    group_negative += records[j].1;
                }
                j += 1;
            }
            area += group_positive * (negatives_below + group_negative / 2.0);
            negatives_below += group_negative;
            i = j;
        }

        Some(area / (positive_total * negative_total))
    }
}

impl LossFunction for WeightedAucLoss {
    fn score(&self, predictions: &[PredictionRecord]) -> Result<f64> {
        if predictions.is_empty() {
            return Err(TimefoldError::InsufficientData(
                "no predictions to score".to_string(),
            ));
        }
        if let Some(bad) = predictions.iter().find(|r| r.weight < 0.0) {
            return Err(TimefoldError::ValidationError(format!(
                "negative prediction weight {}",
                bad.weight
            )));
        }

        let auc = match self.weighted_auc(predictions) {
            Some(auc) => auc,
            None => {
                warn!(
                    n = predictions.len(),
                    "holdout contains a single class; AUC undefined, using 0.5"
                );
                0.5
            }
        };

        Ok((1.0 - auc).powf(self.exponent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[(f64, bool, f64)]) -> Vec<PredictionRecord> {
        rows.iter()
            .map(|&(score, positive, weight)| {
                PredictionRecord::new(score, Label::Boolean(positive), weight)
            })
            .collect()
    }

    #[test]
    fn test_perfect_separator_has_zero_loss() {
        let preds = records(&[
            (0.9, true, 1.0),
            (0.8, true, 1.0),
            (0.3, false, 1.0),
            (0.1, false, 1.0),
        ]);
        let loss = WeightedAucLoss::new(1.0).score(&preds).unwrap();
        assert!(loss.abs() < 1e-12, "loss = {}", loss);
    }

    #[test]
    fn test_inverted_separator_has_loss_one() {
        let preds = records(&[
            (0.1, true, 1.0),
            (0.2, true, 1.0),
            (0.8, false, 1.0),
            (0.9, false, 1.0),
        ]);
        let loss = WeightedAucLoss::new(1.0).score(&preds).unwrap();
        assert!((loss - 1.0).abs() < 1e-12, "loss = {}", loss);
    }

    #[test]
    fn test_all_tied_scores_give_half() {
        let preds = records(&[
            (0.5, true, 1.0),
            (0.5, false, 1.0),
            (0.5, true, 1.0),
            (0.5, false, 1.0),
        ]);
        let loss = WeightedAucLoss::new(1.0).score(&preds).unwrap();
        assert!((loss - 0.5).abs() < 1e-12, "loss = {}", loss);
    }

    #[test]
    fn test_tie_handling_is_order_independent() {
        let forward = records(&[(0.5, true, 1.0), (0.5, false, 1.0), (0.9, true, 1.0)]);
        let mut reversed = forward.clone();
        reversed.reverse();

        let loss = WeightedAucLoss::new(1.0);
        assert_eq!(
            loss.score(&forward).unwrap(),
            loss.score(&reversed).unwrap()
        );
    }

    #[test]
    fn test_weight_scale_invariance() {
        let base = records(&[
            (0.9, true, 1.0),
            (0.7, false, 2.0),
            (0.6, true, 0.5),
            (0.2, false, 1.5),
        ]);
        let scaled: Vec<PredictionRecord> = base
            .iter()
            .map(|r| PredictionRecord::new(r.score, r.label.clone(), r.weight * 3.7))
            .collect();

        let loss = WeightedAucLoss::new(1.0);
        let a = loss.score(&base).unwrap();
        let b = loss.score(&scaled).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_equal_weights_match_unweighted() {
        // Weighting with a constant weight must not change the ranking loss
        let w1 = records(&[
            (0.9, true, 1.0),
            (0.7, false, 1.0),
            (0.6, true, 1.0),
            (0.2, false, 1.0),
        ]);
        let w5: Vec<PredictionRecord> = w1
            .iter()
            .map(|r| PredictionRecord::new(r.score, r.label.clone(), 5.0))
            .collect();

        let loss = WeightedAucLoss::new(1.0);
        assert!((loss.score(&w1).unwrap() - loss.score(&w5).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_weights_shift_the_curve() {
        // Upweighting a misranked negative must increase the loss
        let light = records(&[(0.9, false, 1.0), (0.8, true, 1.0), (0.2, false, 1.0)]);
        let heavy = records(&[(0.9, false, 4.0), (0.8, true, 1.0), (0.2, false, 1.0)]);

        let loss = WeightedAucLoss::new(1.0);
        assert!(loss.score(&heavy).unwrap() > loss.score(&light).unwrap());
    }

    #[test]
    fn test_single_class_returns_sentinel() {
        let only_positives = records(&[(0.9, true, 1.0), (0.1, true, 1.0)]);
        let loss = WeightedAucLoss::new(1.0).score(&only_positives).unwrap();
        assert_eq!(loss, 0.5);

        let only_negatives = records(&[(0.9, false, 1.0), (0.1, false, 1.0)]);
        let loss = WeightedAucLoss::new(1.0).score(&only_negatives).unwrap();
        assert_eq!(loss, 0.5);
    }

    #[test]
    fn test_exponent_sharpens_loss() {
        let preds = records(&[
            (0.9, true, 1.0),
            (0.7, false, 1.0),
            (0.6, true, 1.0),
            (0.2, false, 1.0),
        ]);
        let linear = WeightedAucLoss::new(1.0).score(&preds).unwrap();
        let squared = WeightedAucLoss::new(2.0).score(&preds).unwrap();
        assert!((squared - linear * linear).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_positive_label() {
        let preds = vec![
            PredictionRecord::new(0.9, Label::Categorical("click".into()), 1.0),
            PredictionRecord::new(0.1, Label::Categorical("skip".into()), 1.0),
        ];
        let loss = WeightedAucLoss::new(1.0)
            .with_positive_label(Label::Categorical("click".into()))
            .score(&preds)
            .unwrap();
        assert!(loss.abs() < 1e-12);
    }

    #[test]
    fn test_empty_predictions_error() {
        assert!(WeightedAucLoss::new(1.0).score(&[]).is_err());
    }
}
