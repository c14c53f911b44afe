use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("artifact file not found: {0}")]
    MissingFile(std::path::PathBuf),

    #[error("label map is inconsistent: {0}")]
    InconsistentLabels(String),

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("no labels observed")]
    NoLabels,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
