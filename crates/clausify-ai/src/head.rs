//! Linear classification head over pooled encoder features.

use std::path::Path;

use clausify_core::CoreError;
use clausify_core::artifact::{read_json, write_json};
use serde::{Deserialize, Serialize};

use crate::AiError;

/// `logits = W · x + b`, with `W` stored row-major as `[num_labels][dim]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationHead {
    dim: usize,
    num_labels: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl ClassificationHead {
    /// Zero-initialised head; every label starts equally likely.
    pub fn zeros(dim: usize, num_labels: usize) -> Self {
        Self {
            dim,
            num_labels,
            weights: vec![0.0; dim * num_labels],
            bias: vec![0.0; num_labels],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Weight row for one label.
    pub fn row(&self, label: usize) -> &[f32] {
        &self.weights[label * self.dim..(label + 1) * self.dim]
    }

    pub(crate) fn params_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.weights, &mut self.bias)
    }

    pub fn logits(&self, features: &[f32]) -> Result<Vec<f32>, AiError> {
        if features.len() != self.dim {
            return Err(AiError::DimensionMismatch {
                expected: self.dim,
                found: features.len(),
            });
        }
        Ok((0..self.num_labels)
            .map(|c| dot(self.row(c), features) + self.bias[c])
            .collect())
    }

    /// Probability distribution over labels.
    pub fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, AiError> {
        Ok(softmax(&self.logits(features)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        write_json(path, self)
    }

    /// Load and check the weight shapes agree with `dim` and `num_labels`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let head: Self = read_json(path)?;
        if head.weights.len() != head.dim * head.num_labels || head.bias.len() != head.num_labels {
            return Err(CoreError::InconsistentLabels(format!(
                "head weights have shape {} / bias {} for dim {} and {} labels",
                head.weights.len(),
                head.bias.len(),
                head.dim,
                head.num_labels
            )));
        }
        Ok(head)
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
