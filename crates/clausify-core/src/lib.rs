pub mod artifact;
pub mod clause;
pub mod error;
pub mod labels;
pub mod prediction;
pub mod schema;

pub use artifact::{ClassifierConfig, ModelArtifact};
pub use clause::{ClauseRecord, DEFAULT_LABELS, normalize_clause};
pub use error::CoreError;
pub use labels::LabelMap;
pub use prediction::Prediction;
