//! Classification result returned by the classifier and the HTTP service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CoreError, LabelMap};

/// Arg-max label plus the probability of every known label.
///
/// `scores` iterates in label-id order because ids follow sorted label order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub scores: BTreeMap<String, f32>,
}

impl Prediction {
    /// Build from a probability vector indexed by label id.
    ///
    /// Ties resolve to the lowest id.
    pub fn from_probabilities(probs: &[f32], labels: &LabelMap) -> Result<Self, CoreError> {
        if probs.len() != labels.len() {
            return Err(CoreError::InconsistentLabels(format!(
                "{} probabilities for {} labels",
                probs.len(),
                labels.len()
            )));
        }

        let mut best = 0;
        for (i, &p) in probs.iter().enumerate() {
            if p > probs[best] {
                best = i;
            }
        }

        let scores = labels
            .labels()
            .iter()
            .cloned()
            .zip(probs.iter().copied())
            .collect();

        Ok(Self {
            label: labels.labels()[best].clone(),
            scores,
        })
    }

    /// Sum of all scores; 1.0 up to rounding for a softmax output.
    pub fn total(&self) -> f32 {
        self.scores.values().sum()
    }
}
