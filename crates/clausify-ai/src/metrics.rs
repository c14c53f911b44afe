//! Evaluation metrics: accuracy and macro-averaged F1.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Metrics reported after evaluating the head on the held-out partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub eval_loss: f64,
    pub eval_accuracy: f64,
    pub eval_macro_f1: f64,
    pub eval_samples: usize,
}

/// Fraction of predictions equal to the truth; 0 for empty input.
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// Unweighted mean of per-label F1 over every label seen in truth or predictions.
///
/// A label with no true positives scores 0.
pub fn macro_f1(truth: &[usize], predicted: &[usize]) -> f64 {
    let labels: BTreeSet<usize> = truth.iter().chain(predicted).copied().collect();
    if labels.is_empty() {
        return 0.0;
    }

    let total: f64 = labels
        .iter()
        .map(|&label| {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (&t, &p) in truth.iter().zip(predicted) {
                match (t == label, p == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let denom = 2 * tp + fp + fn_;
            if denom == 0 {
                0.0
            } else {
                2.0 * tp as f64 / denom as f64
            }
        })
        .sum();

    total / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn perfect_predictions_score_one() {
        assert_eq!(macro_f1(&[0, 1, 2], &[0, 1, 2]), 1.0);
    }

    #[test]
    fn macro_f1_averages_labels_equally() {
        // label 0: tp=1 fp=0 fn=1 -> 2/3; label 1: tp=2 fp=1 fn=0 -> 4/5
        let f1 = macro_f1(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        assert!((f1 - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn labels_only_predicted_count_as_zero() {
        // label 2 never appears in the truth: F1 = 0 drags the mean down.
        let f1 = macro_f1(&[0, 1], &[0, 2]);
        assert!((f1 - 1.0 / 3.0).abs() < 1e-12);
    }
}
