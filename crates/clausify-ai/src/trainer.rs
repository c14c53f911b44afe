//! Mini-batch training of the classification head.
//!
//! Cross-entropy over softmax, optimized with AdamW (decay on the weight
//! matrix only, never the bias) under a linear learning-rate decay that
//! reaches zero at the final step.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AiError;
use crate::head::{ClassificationHead, argmax};
use crate::metrics::{EvalMetrics, accuracy, macro_f1};

/// Hyperparameters for one fine-tuning run. Persisted as `training_args.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingArgs {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub eval_batch_size: usize,
    pub epochs: usize,
    pub weight_decay: f32,
    pub logging_steps: usize,
    pub seed: u64,
    pub eval_fraction: f64,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 8,
            eval_batch_size: 8,
            epochs: 5,
            weight_decay: 0.01,
            logging_steps: 10,
            seed: 42,
            eval_fraction: 0.2,
        }
    }
}

impl TrainingArgs {
    pub fn validate(&self) -> Result<(), AiError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(AiError::InvalidArgs(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 || self.eval_batch_size == 0 {
            return Err(AiError::InvalidArgs("batch sizes must be at least 1".into()));
        }
        if self.epochs == 0 {
            return Err(AiError::InvalidArgs("epochs must be at least 1".into()));
        }
        if self.weight_decay < 0.0 {
            return Err(AiError::InvalidArgs(format!(
                "weight_decay must not be negative, got {}",
                self.weight_decay
            )));
        }
        Ok(())
    }

    /// Optimizer steps for `n` training samples.
    pub fn total_steps(&self, n: usize) -> usize {
        n.div_ceil(self.batch_size) * self.epochs
    }
}

/// One logged point of the training curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step: usize,
    pub epoch: f64,
    /// Mean batch loss since the previous entry.
    pub loss: f64,
    pub learning_rate: f32,
}

pub struct TrainOutput {
    pub head: ClassificationHead,
    pub history: Vec<LogEntry>,
    pub global_steps: usize,
    /// Mean batch loss over the whole run.
    pub train_loss: f64,
}

/// AdamW with PyTorch's bias-corrected update.
struct AdamW {
    beta1: f32,
    beta2: f32,
    eps: f32,
    weight_decay: f32,
    t: i32,
    m_w: Vec<f32>,
    v_w: Vec<f32>,
    m_b: Vec<f32>,
    v_b: Vec<f32>,
}

impl AdamW {
    fn new(head: &ClassificationHead, weight_decay: f32) -> Self {
        let n_w = head.dim() * head.num_labels();
        let n_b = head.num_labels();
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay,
            t: 0,
            m_w: vec![0.0; n_w],
            v_w: vec![0.0; n_w],
            m_b: vec![0.0; n_b],
            v_b: vec![0.0; n_b],
        }
    }

    fn step(&mut self, head: &mut ClassificationHead, grad_w: &[f32], grad_b: &[f32], lr: f32) {
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);
        let (weights, bias) = head.params_mut();

        let decay = 1.0 - lr * self.weight_decay;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);
        let update = |p: &mut f32, g: f32, m: &mut f32, v: &mut f32| {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            let denom = (*v / bc2).sqrt() + eps;
            *p -= lr * (*m / bc1) / denom;
        };

        for i in 0..weights.len() {
            weights[i] *= decay;
            update(&mut weights[i], grad_w[i], &mut self.m_w[i], &mut self.v_w[i]);
        }
        for i in 0..bias.len() {
            update(&mut bias[i], grad_b[i], &mut self.m_b[i], &mut self.v_b[i]);
        }
    }
}

/// Learning rate after `completed` of `total` steps, decaying linearly to zero.
pub fn linear_decay(base: f32, completed: usize, total: usize) -> f32 {
    if total == 0 {
        return base;
    }
    base * (total.saturating_sub(completed) as f32 / total as f32)
}

pub struct HeadTrainer {
    args: TrainingArgs,
}

impl HeadTrainer {
    pub fn new(args: TrainingArgs) -> Result<Self, AiError> {
        args.validate()?;
        Ok(Self { args })
    }

    pub fn args(&self) -> &TrainingArgs {
        &self.args
    }

    /// Train a fresh head on `features` (one row per sample) and `labels` (ids).
    pub fn train(
        &self,
        features: &[Vec<f32>],
        labels: &[usize],
        num_labels: usize,
    ) -> Result<TrainOutput, AiError> {
        check_inputs(features, labels, num_labels)?;
        let dim = features[0].len();

        let mut head = ClassificationHead::zeros(dim, num_labels);
        let mut optimizer = AdamW::new(&head, self.args.weight_decay);
        let mut rng = StdRng::seed_from_u64(self.args.seed);

        let n = features.len();
        let steps_per_epoch = n.div_ceil(self.args.batch_size);
        let total_steps = self.args.total_steps(n);
        info!(
            samples = n,
            dim,
            num_labels,
            epochs = self.args.epochs,
            total_steps,
            "training classification head"
        );

        let mut order: Vec<usize> = (0..n).collect();
        let mut grad_w = vec![0.0f32; dim * num_labels];
        let mut grad_b = vec![0.0f32; num_labels];
        let mut history = Vec::new();
        let mut step = 0usize;
        let mut loss_sum = 0.0f64;
        let mut window_sum = 0.0f64;
        let mut window_len = 0usize;

        for epoch in 0..self.args.epochs {
            order.shuffle(&mut rng);

            for batch in order.chunks(self.args.batch_size) {
                grad_w.iter_mut().for_each(|g| *g = 0.0);
                grad_b.iter_mut().for_each(|g| *g = 0.0);

                let mut batch_loss = 0.0f64;
                let scale = 1.0 / batch.len() as f32;
                for &i in batch {
                    let x = &features[i];
                    let probs = head.predict_proba(x)?;
                    batch_loss += cross_entropy(&probs, labels[i]);
                    for (c, &p) in probs.iter().enumerate() {
                        let delta = (p - if c == labels[i] { 1.0 } else { 0.0 }) * scale;
                        grad_b[c] += delta;
                        let row = &mut grad_w[c * dim..(c + 1) * dim];
                        for (g, &xv) in row.iter_mut().zip(x) {
                            *g += delta * xv;
                        }
                    }
                }
                batch_loss /= batch.len() as f64;

                let lr = linear_decay(self.args.learning_rate, step, total_steps);
                optimizer.step(&mut head, &grad_w, &grad_b, lr);
                step += 1;

                loss_sum += batch_loss;
                window_sum += batch_loss;
                window_len += 1;

                if self.args.logging_steps > 0 && step % self.args.logging_steps == 0 {
                    let entry = LogEntry {
                        step,
                        epoch: step as f64 / steps_per_epoch as f64,
                        loss: window_sum / window_len as f64,
                        learning_rate: linear_decay(self.args.learning_rate, step, total_steps),
                    };
                    info!(
                        step = entry.step,
                        epoch = entry.epoch,
                        loss = entry.loss,
                        lr = entry.learning_rate,
                        "train"
                    );
                    history.push(entry);
                    window_sum = 0.0;
                    window_len = 0;
                }
            }
            debug!(epoch = epoch + 1, step, "epoch complete");
        }

        let train_loss = loss_sum / step.max(1) as f64;
        info!(global_steps = step, train_loss, "training complete");
        Ok(TrainOutput {
            head,
            history,
            global_steps: step,
            train_loss,
        })
    }
}

/// Loss, accuracy and macro-F1 of `head` on a labeled set.
pub fn evaluate(
    head: &ClassificationHead,
    features: &[Vec<f32>],
    labels: &[usize],
) -> Result<EvalMetrics, AiError> {
    check_inputs(features, labels, head.num_labels())?;

    let mut loss = 0.0f64;
    let mut predicted = Vec::with_capacity(labels.len());
    for (x, &y) in features.iter().zip(labels) {
        let probs = head.predict_proba(x)?;
        loss += cross_entropy(&probs, y);
        predicted.push(argmax(&probs));
    }

    Ok(EvalMetrics {
        eval_loss: loss / labels.len() as f64,
        eval_accuracy: accuracy(labels, &predicted),
        eval_macro_f1: macro_f1(labels, &predicted),
        eval_samples: labels.len(),
    })
}

fn cross_entropy(probs: &[f32], label: usize) -> f64 {
    -(probs[label].max(1e-12) as f64).ln()
}

fn check_inputs(features: &[Vec<f32>], labels: &[usize], num_labels: usize) -> Result<(), AiError> {
    if features.is_empty() {
        return Err(AiError::Empty);
    }
    if features.len() != labels.len() {
        return Err(AiError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }
    let dim = features[0].len();
    if let Some(row) = features.iter().find(|row| row.len() != dim) {
        return Err(AiError::DimensionMismatch {
            expected: dim,
            found: row.len(),
        });
    }
    if let Some(&id) = labels.iter().find(|&&id| id >= num_labels) {
        return Err(AiError::LabelOutOfRange { id, num_labels });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three well-separated clusters around the unit axes.
    fn clusters(per_class: usize) -> (Vec<Vec<f32>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..per_class {
            let jitter = (i as f32 * 0.37).sin() * 0.1;
            for class in 0..3 {
                let mut x = vec![jitter; 3];
                x[class] = 1.0;
                features.push(x);
                labels.push(class);
            }
        }
        (features, labels)
    }

    fn args() -> TrainingArgs {
        TrainingArgs {
            learning_rate: 0.05,
            epochs: 20,
            logging_steps: 5,
            ..TrainingArgs::default()
        }
    }

    #[test]
    fn defaults() {
        let args = TrainingArgs::default();
        assert_eq!(args.batch_size, 8);
        assert_eq!(args.epochs, 5);
        assert_eq!(args.seed, 42);
        assert_eq!(args.logging_steps, 10);
        assert!((args.weight_decay - 0.01).abs() < 1e-9);
    }

    #[test]
    fn total_steps_rounds_partial_batches_up() {
        let args = TrainingArgs::default();
        assert_eq!(args.total_steps(16), 10);
        assert_eq!(args.total_steps(17), 15);
    }

    #[test]
    fn linear_decay_reaches_zero() {
        assert_eq!(linear_decay(1.0, 0, 10), 1.0);
        assert!((linear_decay(1.0, 5, 10) - 0.5).abs() < 1e-6);
        assert_eq!(linear_decay(1.0, 10, 10), 0.0);
        assert_eq!(linear_decay(1.0, 12, 10), 0.0);
    }

    #[test]
    fn invalid_args_rejected() {
        let zero_batch = TrainingArgs {
            batch_size: 0,
            ..TrainingArgs::default()
        };
        assert!(HeadTrainer::new(zero_batch).is_err());
        let zero_epochs = TrainingArgs {
            epochs: 0,
            ..TrainingArgs::default()
        };
        assert!(HeadTrainer::new(zero_epochs).is_err());
    }

    #[test]
    fn learns_separable_clusters() {
        let (features, labels) = clusters(10);
        let trainer = HeadTrainer::new(args()).unwrap();
        let out = trainer.train(&features, &labels, 3).unwrap();

        let metrics = evaluate(&out.head, &features, &labels).unwrap();
        assert_eq!(metrics.eval_accuracy, 1.0);
        assert_eq!(metrics.eval_macro_f1, 1.0);
        assert!(metrics.eval_loss < (3.0f64).ln());
    }

    #[test]
    fn loss_goes_down() {
        let (features, labels) = clusters(10);
        let out = HeadTrainer::new(args())
            .unwrap()
            .train(&features, &labels, 3)
            .unwrap();
        // 30 samples, batch 8 -> 4 steps/epoch, 80 steps, logged every 5.
        assert_eq!(out.global_steps, 80);
        assert_eq!(out.history.len(), 16);
        let first = out.history.first().unwrap().loss;
        let last = out.history.last().unwrap().loss;
        assert!(last < first, "loss {first} -> {last}");
        assert_eq!(out.history.last().unwrap().learning_rate, 0.0);
    }

    #[test]
    fn same_seed_same_head() {
        let (features, labels) = clusters(6);
        let trainer = HeadTrainer::new(args()).unwrap();
        let a = trainer.train(&features, &labels, 3).unwrap();
        let b = trainer.train(&features, &labels, 3).unwrap();
        assert_eq!(a.head, b.head);
    }

    #[test]
    fn bias_is_not_decayed_weights_are() {
        // Zero gradients: only weight decay moves the parameters.
        let mut head = ClassificationHead::zeros(2, 2);
        {
            let (w, b) = head.params_mut();
            w.fill(1.0);
            b.fill(1.0);
        }
        let mut opt = AdamW::new(&head, 0.1);
        opt.step(&mut head, &[0.0; 4], &[0.0; 2], 0.5);
        assert!((head.row(0)[0] - 0.95).abs() < 1e-6);
        assert!((head.logits(&[0.0, 0.0]).unwrap()[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let trainer = HeadTrainer::new(TrainingArgs::default()).unwrap();
        assert!(matches!(trainer.train(&[], &[], 2), Err(AiError::Empty)));
        assert!(matches!(
            trainer.train(&[vec![1.0]], &[0, 1], 2),
            Err(AiError::LengthMismatch { .. })
        ));
        assert!(matches!(
            trainer.train(&[vec![1.0]], &[5], 2),
            Err(AiError::LabelOutOfRange { id: 5, num_labels: 2 })
        ));
        assert!(matches!(
            trainer.train(&[vec![1.0], vec![1.0, 2.0]], &[0, 1], 2),
            Err(AiError::DimensionMismatch { .. })
        ));
    }
}
