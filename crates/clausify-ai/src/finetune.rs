//! Fine-tuning driver: clause table in, model artifact directory out.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clausify_core::artifact::{self, ModelArtifact, write_json};
use clausify_core::{ClassifierConfig, LabelMap};
use tracing::info;

use crate::encode::Encode;
use crate::metrics::EvalMetrics;
use crate::split::stratified_split;
use crate::trainer::{HeadTrainer, LogEntry, TrainingArgs, evaluate};

pub struct FineTuneConfig {
    /// `text,label` CSV produced by the extractor.
    pub data_file: PathBuf,
    /// Directory holding the pretrained `model.onnx` and `tokenizer.json`.
    pub base_model_dir: PathBuf,
    /// Checkpoint name recorded in `classifier_config.json`.
    pub base_model_name: String,
    pub output_dir: PathBuf,
    pub max_length: usize,
    pub args: TrainingArgs,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("clauses_clean.csv"),
            base_model_dir: PathBuf::from("models/legal-bert-base-uncased"),
            base_model_name: "nlpaueb/legal-bert-base-uncased".to_string(),
            output_dir: PathBuf::from("clause_classifier_legalbert"),
            max_length: artifact::DEFAULT_MAX_LENGTH,
            args: TrainingArgs::default(),
        }
    }
}

#[derive(Debug)]
pub struct FineTuneReport {
    pub labels: LabelMap,
    pub train_samples: usize,
    pub eval: EvalMetrics,
    pub history: Vec<LogEntry>,
    pub global_steps: usize,
    pub train_loss: f64,
    pub elapsed_secs: f64,
}

/// Run the whole fine-tuning pipeline with the given encoder.
///
/// The encoder must be the one loaded from `cfg.base_model_dir`; its files are
/// copied into the output directory so the artifact is self-contained.
pub fn fine_tune_with<E: Encode>(encoder: &mut E, cfg: &FineTuneConfig) -> anyhow::Result<FineTuneReport> {
    let start = Instant::now();
    cfg.args.validate()?;

    // 1. Check inputs before anything is written, then load the clause table.
    anyhow::ensure!(
        cfg.data_file.exists(),
        "{} not found (run `clausify extract` first)",
        cfg.data_file.display()
    );
    for file in [artifact::MODEL_FILE, artifact::TOKENIZER_FILE] {
        let path = cfg.base_model_dir.join(file);
        anyhow::ensure!(path.is_file(), "base model file {} not found", path.display());
    }
    let records = clausify_store::read_clauses(&cfg.data_file)
        .with_context(|| format!("reading {}", cfg.data_file.display()))?;
    anyhow::ensure!(!records.is_empty(), "{} has no clauses", cfg.data_file.display());
    info!(rows = records.len(), path = %cfg.data_file.display(), "loaded clause table");

    // 2. Label vocabulary, ids by sorted order.
    let labels = LabelMap::from_observed(records.iter().map(|r| r.label.as_str()))?;
    let label_ids = records
        .iter()
        .map(|r| labels.require_id(&r.label))
        .collect::<Result<Vec<_>, _>>()?;
    info!(labels = labels.len(), "label vocabulary");

    // 3. Stratified split.
    let split = stratified_split(&label_ids, cfg.args.eval_fraction, cfg.args.seed)
        .context("splitting train/eval")?;
    info!(train = split.train.len(), eval = split.eval.len(), "split");

    // 4. Encode both partitions with the frozen encoder.
    let train_features = encode_partition(encoder, &records, &split.train, cfg.args.batch_size, "train")?;
    let eval_features = encode_partition(encoder, &records, &split.eval, cfg.args.eval_batch_size, "eval")?;
    let train_labels: Vec<usize> = split.train.iter().map(|&i| label_ids[i]).collect();
    let eval_labels: Vec<usize> = split.eval.iter().map(|&i| label_ids[i]).collect();

    // 5. Train and evaluate the head.
    let trainer = HeadTrainer::new(cfg.args.clone())?;
    let output = trainer.train(&train_features, &train_labels, labels.len())?;
    let eval = evaluate(&output.head, &eval_features, &eval_labels)?;
    info!(
        eval_loss = eval.eval_loss,
        eval_accuracy = eval.eval_accuracy,
        eval_macro_f1 = eval.eval_macro_f1,
        "evaluation"
    );

    // 6. Persist the artifact.
    write_artifact(cfg, encoder.hidden_size(), &labels, &output.head, &eval)?;
    info!(dir = %cfg.output_dir.display(), "saved model artifact");

    Ok(FineTuneReport {
        labels,
        train_samples: train_labels.len(),
        eval,
        history: output.history,
        global_steps: output.global_steps,
        train_loss: output.train_loss,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

/// Load the ONNX encoder from `cfg.base_model_dir` and run [`fine_tune_with`].
#[cfg(feature = "onnx")]
pub fn run_fine_tuning(cfg: &FineTuneConfig) -> anyhow::Result<FineTuneReport> {
    let mut encoder = crate::Encoder::load_dir(&cfg.base_model_dir, cfg.max_length)
        .with_context(|| format!("loading base model from {}", cfg.base_model_dir.display()))?;
    fine_tune_with(&mut encoder, cfg)
}

fn encode_partition<E: Encode>(
    encoder: &mut E,
    records: &[clausify_core::ClauseRecord],
    indices: &[usize],
    batch_size: usize,
    name: &str,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let total = indices.len();
    let mut features = Vec::with_capacity(total);
    for chunk in indices.chunks(batch_size) {
        let texts: Vec<&str> = chunk.iter().map(|&i| records[i].text.as_str()).collect();
        let batch = encoder
            .encode_batch(&texts)
            .with_context(|| format!("encoding {name} clauses"))?;
        features.extend(batch);
        eprint!(
            "\r  Encoded {name} {}/{total} ({:.1}%)",
            features.len(),
            features.len() as f64 / total as f64 * 100.0
        );
    }
    eprintln!();
    Ok(features)
}

fn write_artifact(
    cfg: &FineTuneConfig,
    hidden_size: usize,
    labels: &LabelMap,
    head: &crate::ClassificationHead,
    eval: &EvalMetrics,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating {}", cfg.output_dir.display()))?;
    let out = ModelArtifact::new(&cfg.output_dir);

    copy_base_file(&cfg.base_model_dir.join(artifact::MODEL_FILE), &out.model_path())?;
    copy_base_file(&cfg.base_model_dir.join(artifact::TOKENIZER_FILE), &out.tokenizer_path())?;

    head.save(&out.head_path())?;
    labels.save(&out.labels_path())?;
    out.save_config(&ClassifierConfig {
        base_model: cfg.base_model_name.clone(),
        max_length: cfg.max_length,
        hidden_size,
        num_labels: labels.len(),
        trained_at: chrono::Utc::now().to_rfc3339(),
    })?;
    write_json(&out.training_args_path(), &cfg.args)?;
    write_json(&out.eval_results_path(), eval)?;
    Ok(())
}

fn copy_base_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    // Retraining into the base directory leaves the file in place.
    if from.canonicalize().ok() == to.canonicalize().ok() && to.exists() {
        return Ok(());
    }
    std::fs::copy(from, to).with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassificationHead;
    use crate::classifier::ClauseClassifier;
    use crate::classify::Classify;
    use crate::encode::testing::HashingEncoder;
    use clausify_core::ClauseRecord;
    use tempfile::TempDir;

    const PER_LABEL: usize = 10;

    fn write_dataset(dir: &Path) -> PathBuf {
        let templates = [
            (
                "Termination For Convenience",
                "Either party may terminate this Agreement for convenience upon {} days notice.",
            ),
            (
                "Non-Compete",
                "Licensee shall not compete with Licensor for {} months in the territory.",
            ),
            (
                "Cap On Liability",
                "Liability shall not exceed the fees paid in the preceding {} months.",
            ),
        ];
        let mut records = Vec::new();
        for (label, template) in templates {
            for i in 0..PER_LABEL {
                records.push(ClauseRecord::new(template.replace("{}", &(i + 1).to_string()), label));
            }
        }
        let path = dir.join("clauses_clean.csv");
        clausify_store::write_clauses(&path, &records).unwrap();
        path
    }

    fn setup() -> (TempDir, FineTuneConfig) {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join(artifact::MODEL_FILE), b"onnx").unwrap();
        std::fs::write(base.join(artifact::TOKENIZER_FILE), b"{}").unwrap();

        let cfg = FineTuneConfig {
            data_file: write_dataset(tmp.path()),
            base_model_dir: base,
            base_model_name: "hashing".into(),
            output_dir: tmp.path().join("out"),
            max_length: 128,
            args: TrainingArgs {
                learning_rate: 0.05,
                epochs: 10,
                ..TrainingArgs::default()
            },
        };
        (tmp, cfg)
    }

    #[test]
    fn writes_complete_artifact() {
        let (_tmp, cfg) = setup();
        let mut encoder = HashingEncoder::new(64);
        let report = fine_tune_with(&mut encoder, &cfg).unwrap();

        // 30 rows, ceil(0.2 * 30) = 6 held out, 2 per class.
        assert_eq!(report.train_samples, 24);
        assert_eq!(report.eval.eval_samples, 6);
        assert_eq!(report.global_steps, 30);
        assert_eq!(report.history.len(), 3);

        let out = ModelArtifact::new(&cfg.output_dir);
        out.check_complete().unwrap();
        assert!(out.training_args_path().exists());
        assert!(out.eval_results_path().exists());

        let config = out.load_config().unwrap();
        assert_eq!(config.hidden_size, 64);
        assert_eq!(config.num_labels, 3);
        assert_eq!(config.max_length, 128);
        assert_eq!(
            out.load_labels().unwrap().labels(),
            &["Cap On Liability", "Non-Compete", "Termination For Convenience"]
        );
        let args: TrainingArgs = clausify_core::artifact::read_json(&out.training_args_path()).unwrap();
        assert_eq!(args, cfg.args);
    }

    #[test]
    fn saved_artifact_classifies() {
        let (_tmp, cfg) = setup();
        let mut encoder = HashingEncoder::new(128);
        let report = fine_tune_with(&mut encoder, &cfg).unwrap();
        assert_eq!(report.eval.eval_accuracy, 1.0);

        let out = ModelArtifact::new(&cfg.output_dir);
        let mut clf = ClauseClassifier::from_parts(
            HashingEncoder::new(128),
            ClassificationHead::load(&out.head_path()).unwrap(),
            out.load_labels().unwrap(),
            out.load_config().unwrap(),
        )
        .unwrap();
        let prediction = clf
            .classify("Either party may terminate this Agreement for convenience upon thirty (30) days prior written notice.")
            .unwrap();
        assert_eq!(prediction.label, "Termination For Convenience");
    }

    #[test]
    fn same_seed_same_head() {
        let (_tmp, cfg) = setup();
        fine_tune_with(&mut HashingEncoder::new(32), &cfg).unwrap();
        let out = ModelArtifact::new(&cfg.output_dir);
        let first = ClassificationHead::load(&out.head_path()).unwrap();
        fine_tune_with(&mut HashingEncoder::new(32), &cfg).unwrap();
        assert_eq!(ClassificationHead::load(&out.head_path()).unwrap(), first);
    }

    #[test]
    fn missing_data_file_is_fatal() {
        let (tmp, mut cfg) = setup();
        cfg.data_file = tmp.path().join("nope.csv");
        let err = fine_tune_with(&mut HashingEncoder::new(8), &cfg).unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn missing_base_files_are_fatal() {
        let (_tmp, cfg) = setup();
        std::fs::remove_file(cfg.base_model_dir.join(artifact::TOKENIZER_FILE)).unwrap();
        let err = fine_tune_with(&mut HashingEncoder::new(8), &cfg).unwrap_err();
        assert!(err.to_string().contains(artifact::TOKENIZER_FILE));
        // Nothing is trained or written.
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn missing_base_model_leaves_no_output() {
        let (_tmp, cfg) = setup();
        std::fs::remove_file(cfg.base_model_dir.join(artifact::MODEL_FILE)).unwrap();
        let err = fine_tune_with(&mut HashingEncoder::new(8), &cfg).unwrap_err();
        assert!(err.to_string().contains(artifact::MODEL_FILE));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn singleton_label_fails_split() {
        let (tmp, mut cfg) = setup();
        let path = tmp.path().join("tiny.csv");
        clausify_store::write_clauses(
            &path,
            &[
                ClauseRecord::new("Either party may terminate for convenience.", "Termination For Convenience"),
                ClauseRecord::new("Customer may terminate for convenience.", "Termination For Convenience"),
                ClauseRecord::new("Licensee shall not compete.", "Non-Compete"),
            ],
        )
        .unwrap();
        cfg.data_file = path;
        assert!(fine_tune_with(&mut HashingEncoder::new(8), &cfg).is_err());
    }
}
