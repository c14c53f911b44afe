//! Clause classification: frozen ONNX encoder, trainable linear head, fine-tuning driver.

mod error;
pub use error::AiError;

pub mod classifier;
pub mod classify;
pub mod encode;
pub mod finetune;
pub mod head;
pub mod metrics;
pub mod split;
pub mod trainer;

#[cfg(feature = "onnx")]
mod encoder;
#[cfg(feature = "onnx")]
pub use encoder::Encoder;

pub use classifier::ClauseClassifier;
pub use classify::Classify;
pub use encode::Encode;
#[cfg(feature = "onnx")]
pub use finetune::run_fine_tuning;
pub use finetune::{FineTuneConfig, FineTuneReport, fine_tune_with};
pub use head::ClassificationHead;
pub use metrics::EvalMetrics;
pub use split::{Split, SplitError, stratified_split};
pub use trainer::{HeadTrainer, LogEntry, TrainOutput, TrainingArgs};
