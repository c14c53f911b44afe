//! Clause classifier: frozen encoder plus trained linear head.

use clausify_core::{ClassifierConfig, LabelMap, Prediction};
use tracing::debug;

use crate::AiError;
use crate::classify::Classify;
use crate::encode::Encode;
use crate::head::ClassificationHead;

pub struct ClauseClassifier<E> {
    encoder: E,
    head: ClassificationHead,
    labels: LabelMap,
    config: ClassifierConfig,
}

impl<E: Encode> ClauseClassifier<E> {
    /// Assemble a classifier, checking that encoder, head and labels agree.
    pub fn from_parts(
        encoder: E,
        head: ClassificationHead,
        labels: LabelMap,
        config: ClassifierConfig,
    ) -> Result<Self, AiError> {
        if head.dim() != encoder.hidden_size() {
            return Err(AiError::DimensionMismatch {
                expected: encoder.hidden_size(),
                found: head.dim(),
            });
        }
        if head.num_labels() != labels.len() {
            return Err(clausify_core::CoreError::InconsistentLabels(format!(
                "head has {} outputs but labels.json has {} labels",
                head.num_labels(),
                labels.len()
            ))
            .into());
        }
        Ok(Self {
            encoder,
            head,
            labels,
            config,
        })
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.labels
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one text. Empty text is valid input.
    pub fn predict(&mut self, text: &str) -> anyhow::Result<Prediction> {
        let features = self.encoder.encode(text)?;
        let probs = self.head.predict_proba(&features)?;
        let prediction = Prediction::from_probabilities(&probs, &self.labels)?;
        debug!(label = %prediction.label, chars = text.len(), "classified");
        Ok(prediction)
    }
}

impl<E: Encode> Classify for ClauseClassifier<E> {
    fn classify(&mut self, text: &str) -> anyhow::Result<Prediction> {
        self.predict(text)
    }

    fn labels(&self) -> Vec<String> {
        self.labels.labels().to_vec()
    }
}

#[cfg(feature = "onnx")]
impl ClauseClassifier<crate::Encoder> {
    /// Load everything in a model artifact directory once.
    pub fn load(model_dir: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        use clausify_core::ModelArtifact;

        let artifact = ModelArtifact::new(model_dir);
        artifact
            .check_complete()
            .with_context(|| format!("incomplete model directory {}", model_dir.display()))?;

        let config = artifact.load_config()?;
        let labels = artifact.load_labels()?;
        let head = ClassificationHead::load(&artifact.head_path())?;
        let encoder = crate::Encoder::load(
            &artifact.model_path(),
            &artifact.tokenizer_path(),
            config.max_length,
        )?;

        tracing::info!(
            labels = labels.len(),
            base_model = %config.base_model,
            dir = %model_dir.display(),
            "loaded clause classifier"
        );
        Ok(Self::from_parts(encoder, head, labels, config)?)
    }
}
