use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("csv file not found: {0}")]
    CsvNotFound(std::path::PathBuf),

    #[error("column {column:?} not found in {path}")]
    MissingColumn {
        column: String,
        path: std::path::PathBuf,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
