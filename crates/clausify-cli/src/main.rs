mod display;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use clausify_ai::{ClauseClassifier, Classify, FineTuneConfig, TrainingArgs};
use clausify_core::DEFAULT_LABELS;
use clausify_core::artifact::DEFAULT_MAX_LENGTH;
use clausify_serve::ClassifierClient;
use tracing_subscriber::EnvFilter;

const SMOKE_TEXT: &str = "Either party may terminate this Agreement for convenience upon thirty (30) days prior written notice.";

#[derive(Parser)]
#[command(name = "clausify")]
#[command(about = "Legal-clause classifier: extract, train, serve, test")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract labeled clauses from a CUAD master_clauses.csv
    Extract {
        /// Contract table, one column per label
        #[arg(long, env = "CLAUSIFY_INPUT", default_value = "master_clauses.csv")]
        input: PathBuf,

        /// Output clause table (text,label)
        #[arg(long, env = "CLAUSIFY_CLAUSES", default_value = "clauses_clean.csv")]
        output: PathBuf,

        /// Label columns to extract (repeat or comma-separate; defaults to the six CUAD labels)
        #[arg(long = "label", env = "CLAUSIFY_LABELS", value_delimiter = ',')]
        labels: Vec<String>,
    },

    /// Fine-tune the classification head and write the model directory
    Train {
        /// Clause table produced by `extract`
        #[arg(long, env = "CLAUSIFY_CLAUSES", default_value = "clauses_clean.csv")]
        data: PathBuf,

        /// Directory with the base model's model.onnx and tokenizer.json
        #[arg(long, env = "CLAUSIFY_BASE_MODEL_DIR", default_value = "models/legal-bert-base-uncased")]
        base_model_dir: PathBuf,

        /// Checkpoint name recorded in the model directory
        #[arg(long, env = "CLAUSIFY_BASE_MODEL", default_value = "nlpaueb/legal-bert-base-uncased")]
        base_model: String,

        /// Output model directory
        #[arg(long, env = "CLAUSIFY_MODEL_DIR", default_value = "clause_classifier_legalbert")]
        output_dir: PathBuf,

        /// Maximum tokens per clause
        #[arg(long, env = "CLAUSIFY_MAX_LENGTH", default_value_t = DEFAULT_MAX_LENGTH)]
        max_length: usize,

        #[arg(long, env = "CLAUSIFY_LEARNING_RATE", default_value_t = TrainingArgs::default().learning_rate)]
        learning_rate: f32,

        #[arg(long, env = "CLAUSIFY_BATCH_SIZE", default_value_t = TrainingArgs::default().batch_size)]
        batch_size: usize,

        #[arg(long, env = "CLAUSIFY_EVAL_BATCH_SIZE", default_value_t = TrainingArgs::default().eval_batch_size)]
        eval_batch_size: usize,

        #[arg(long, env = "CLAUSIFY_EPOCHS", default_value_t = TrainingArgs::default().epochs)]
        epochs: usize,

        #[arg(long, env = "CLAUSIFY_WEIGHT_DECAY", default_value_t = TrainingArgs::default().weight_decay)]
        weight_decay: f32,

        /// Log the training loss every N optimizer steps
        #[arg(long, env = "CLAUSIFY_LOGGING_STEPS", default_value_t = TrainingArgs::default().logging_steps)]
        logging_steps: usize,

        /// Seed for the split and the per-epoch shuffle
        #[arg(long, env = "CLAUSIFY_SEED", default_value_t = TrainingArgs::default().seed)]
        seed: u64,

        /// Fraction of clauses held out for evaluation
        #[arg(long, env = "CLAUSIFY_EVAL_FRACTION", default_value_t = TrainingArgs::default().eval_fraction)]
        eval_fraction: f64,
    },

    /// Serve /health and /classify over HTTP
    Serve {
        #[arg(long, env = "CLAUSIFY_ADDR", default_value = clausify_serve::DEFAULT_ADDR)]
        addr: SocketAddr,

        #[arg(long, env = "CLAUSIFY_MODEL_DIR", default_value = "clause_classifier_legalbert")]
        model_dir: PathBuf,
    },

    /// Classify a fixed termination clause with the saved model
    Smoke {
        #[arg(long, env = "CLAUSIFY_MODEL_DIR", default_value = "clause_classifier_legalbert")]
        model_dir: PathBuf,
    },

    /// Classify a clause, or every clause of a contract file
    Classify {
        /// Clause text
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Contract text file, split into clauses on blank lines
        #[arg(long)]
        file: Option<PathBuf>,

        /// Use a running service instead of the local model (e.g. http://127.0.0.1:8001)
        #[arg(long, env = "CLAUSIFY_URL")]
        url: Option<String>,

        #[arg(long, env = "CLAUSIFY_MODEL_DIR", default_value = "clause_classifier_legalbert")]
        model_dir: PathBuf,
    },

    /// Print the clauses a contract file splits into
    Split {
        /// Contract text file
        file: PathBuf,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Extract { .. } => "extract",
            Self::Train { .. } => "train",
            Self::Serve { .. } => "serve",
            Self::Smoke { .. } => "smoke",
            Self::Classify { .. } => "classify",
            Self::Split { .. } => "split",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    tracing::info!(command = cli.command.name(), "clausify v{}", env!("CARGO_PKG_VERSION"));
    match cli.command {
        Commands::Extract {
            input,
            output,
            labels,
        } => cmd_extract(&input, &output, labels),
        Commands::Train {
            data,
            base_model_dir,
            base_model,
            output_dir,
            max_length,
            learning_rate,
            batch_size,
            eval_batch_size,
            epochs,
            weight_decay,
            logging_steps,
            seed,
            eval_fraction,
        } => cmd_train(FineTuneConfig {
            data_file: data,
            base_model_dir,
            base_model_name: base_model,
            output_dir,
            max_length,
            args: TrainingArgs {
                learning_rate,
                batch_size,
                eval_batch_size,
                epochs,
                weight_decay,
                logging_steps,
                seed,
                eval_fraction,
            },
        }),
        Commands::Serve { addr, model_dir } => cmd_serve(addr, &model_dir).await,
        Commands::Smoke { model_dir } => cmd_smoke(&model_dir),
        Commands::Classify {
            text,
            file,
            url,
            model_dir,
        } => cmd_classify(text, file.as_deref(), url, &model_dir).await,
        Commands::Split { file } => cmd_split(&file),
    }
}

fn cmd_extract(input: &Path, output: &Path, labels: Vec<String>) -> anyhow::Result<()> {
    let labels = if labels.is_empty() {
        DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
    } else {
        labels
    };
    let stats = clausify_store::run_extraction(input, output, &labels)
        .with_context(|| format!("extracting clauses from {}", input.display()))?;
    print!("{}", display::format_extract_stats(&stats));
    println!("Saved {} clauses to {}", stats.clauses_written, output.display());
    Ok(())
}

fn cmd_train(cfg: FineTuneConfig) -> anyhow::Result<()> {
    let report = clausify_ai::run_fine_tuning(&cfg)?;
    print!("{}", display::format_report(&report));
    println!("Model saved to {}", cfg.output_dir.display());
    Ok(())
}

async fn cmd_serve(addr: SocketAddr, model_dir: &Path) -> anyhow::Result<()> {
    let classifier = load_classifier(model_dir)?;
    clausify_serve::serve(addr, Box::new(classifier)).await?;
    Ok(())
}

fn cmd_smoke(model_dir: &Path) -> anyhow::Result<()> {
    println!("Loading model from: {}", model_dir.display());
    let mut classifier = load_classifier(model_dir)?;

    println!("\nClassifying text:\n{SMOKE_TEXT}\n");
    let prediction = classifier.classify(SMOKE_TEXT)?;
    print!("{}", display::format_prediction(&prediction));
    Ok(())
}

async fn cmd_classify(
    text: Option<String>,
    file: Option<&Path>,
    url: Option<String>,
    model_dir: &Path,
) -> anyhow::Result<()> {
    let clauses = match (&text, file) {
        (Some(text), _) => vec![text.clone()],
        (None, Some(path)) => {
            let contract = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            clausify_store::split_into_clauses(&contract)
        }
        (None, None) => anyhow::bail!("pass --text or --file"),
    };
    if clauses.is_empty() {
        println!("No clauses found.");
        return Ok(());
    }

    let predictions = match url {
        Some(url) => {
            let client = ClassifierClient::new(url);
            let mut predictions = Vec::with_capacity(clauses.len());
            for clause in &clauses {
                let prediction = client
                    .classify(clause)
                    .await
                    .with_context(|| format!("classifying via {}", client.base_url()))?;
                predictions.push(prediction);
            }
            predictions
        }
        None => {
            let mut classifier = load_classifier(model_dir)?;
            clauses
                .iter()
                .map(|clause| classifier.classify(clause))
                .collect::<anyhow::Result<Vec<_>>>()?
        }
    };

    if text.is_some() {
        print!("{}", display::format_prediction(&predictions[0]));
    } else {
        for (i, (clause, prediction)) in clauses.iter().zip(&predictions).enumerate() {
            println!("{}", display::format_clause_row(i, clause, prediction));
        }
    }
    Ok(())
}

fn cmd_split(file: &Path) -> anyhow::Result<()> {
    let contract =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let clauses = clausify_store::split_into_clauses(&contract);
    for (i, clause) in clauses.iter().enumerate() {
        println!("[{}] {clause}\n", i + 1);
    }
    eprintln!("{} clauses", clauses.len());
    Ok(())
}

fn load_classifier(model_dir: &Path) -> anyhow::Result<ClauseClassifier<clausify_ai::Encoder>> {
    ClauseClassifier::load(model_dir)
        .with_context(|| format!("loading model from {} (run `clausify train` first)", model_dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn train_defaults_match_training_args() {
        let cli = Cli::try_parse_from(["clausify", "train"]).unwrap();
        let Commands::Train {
            data,
            batch_size,
            epochs,
            seed,
            max_length,
            output_dir,
            ..
        } = cli.command
        else {
            panic!("expected train");
        };
        assert_eq!(data, PathBuf::from("clauses_clean.csv"));
        assert_eq!(output_dir, PathBuf::from("clause_classifier_legalbert"));
        assert_eq!(batch_size, 8);
        assert_eq!(epochs, 5);
        assert_eq!(seed, 42);
        assert_eq!(max_length, 512);
    }

    #[test]
    fn serve_defaults_to_port_8001() {
        let cli = Cli::try_parse_from(["clausify", "serve"]).unwrap();
        let Commands::Serve { addr, .. } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(addr.port(), 8001);
    }

    #[test]
    fn extract_labels_are_comma_separated() {
        let cli = Cli::try_parse_from(["clausify", "extract", "--label", "Non-Compete,Exclusivity"])
            .unwrap();
        let Commands::Extract { labels, .. } = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(labels, vec!["Non-Compete", "Exclusivity"]);
    }

    #[test]
    fn command_names_match_subcommands() {
        for name in ["extract", "train", "serve", "smoke", "split"] {
            let args: &[&str] = if name == "split" {
                &["clausify", name, "contract.txt"]
            } else {
                &["clausify", name]
            };
            assert_eq!(Cli::try_parse_from(args).unwrap().command.name(), name);
        }
        let cli = Cli::try_parse_from(["clausify", "classify", "--text", "a"]).unwrap();
        assert_eq!(cli.command.name(), "classify");
    }

    #[test]
    fn classify_needs_text_or_file() {
        assert!(Cli::try_parse_from(["clausify", "classify"]).is_err());
        assert!(Cli::try_parse_from(["clausify", "classify", "--text", "a", "--file", "b"]).is_err());
        assert!(Cli::try_parse_from(["clausify", "classify", "--text", "a"]).is_ok());
    }
}
