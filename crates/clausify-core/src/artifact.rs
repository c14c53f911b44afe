//! Layout of the model artifact directory.
//!
//! The directory written by the fine-tuning driver is the whole contract with
//! the service and the smoke test:
//!
//! ```text
//! clause_classifier_legalbert/
//!   model.onnx              frozen encoder (copied from the base model)
//!   tokenizer.json          tokenizer (copied from the base model)
//!   head.json               classification head weights
//!   labels.json             id2label / label2id
//!   classifier_config.json  base model, max length, hidden size
//!   training_args.json      hyperparameters of the run
//!   eval_results.json       final evaluation metrics
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CoreError, LabelMap};

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const HEAD_FILE: &str = "head.json";
pub const LABELS_FILE: &str = "labels.json";
pub const CONFIG_FILE: &str = "classifier_config.json";
pub const TRAINING_ARGS_FILE: &str = "training_args.json";
pub const EVAL_RESULTS_FILE: &str = "eval_results.json";

/// Default maximum token length for truncation.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Encoder settings recorded next to the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Name of the pretrained checkpoint the encoder came from.
    pub base_model: String,
    pub max_length: usize,
    /// Width of the pooled encoder output.
    pub hidden_size: usize,
    pub num_labels: usize,
    /// ISO 8601 timestamp string.
    pub trained_at: String,
}

/// Paths inside a model artifact directory.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    dir: PathBuf,
}

impl ModelArtifact {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn head_path(&self) -> PathBuf {
        self.dir.join(HEAD_FILE)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(LABELS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn training_args_path(&self) -> PathBuf {
        self.dir.join(TRAINING_ARGS_FILE)
    }

    pub fn eval_results_path(&self) -> PathBuf {
        self.dir.join(EVAL_RESULTS_FILE)
    }

    /// Fail with [`CoreError::MissingFile`] on the first required file that is absent.
    pub fn check_complete(&self) -> Result<(), CoreError> {
        for path in [
            self.model_path(),
            self.tokenizer_path(),
            self.head_path(),
            self.labels_path(),
            self.config_path(),
        ] {
            if !path.exists() {
                return Err(CoreError::MissingFile(path));
            }
        }
        Ok(())
    }

    pub fn load_labels(&self) -> Result<LabelMap, CoreError> {
        LabelMap::load(&self.labels_path())
    }

    pub fn load_config(&self) -> Result<ClassifierConfig, CoreError> {
        read_json(&self.config_path())
    }

    pub fn save_config(&self, config: &ClassifierConfig) -> Result<(), CoreError> {
        write_json(&self.config_path(), config)
    }
}

/// Write `value` as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Read a JSON file, reporting a missing file distinctly from a parse error.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CoreError> {
    if !path.exists() {
        return Err(CoreError::MissingFile(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
