use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("label id {id} out of range for {num_labels} labels")]
    LabelOutOfRange { id: usize, num_labels: usize },

    #[error("{features} feature rows for {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("no training samples")]
    Empty,

    #[error("invalid training argument: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Core(#[from] clausify_core::CoreError),
}
