use thiserror::Error;

/// Errors returned by the clustering and stability pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Input slice is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Two index-aligned inputs have different lengths.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Found length.
        found: usize,
    },

    /// An input record carries a value outside its domain.
    #[error("invalid record in {table} at row {row}: {message}")]
    InvalidRecord {
        /// Table the record came from.
        table: &'static str,
        /// Zero-based row index.
        row: usize,
        /// Human-readable explanation.
        message: String,
    },

    /// A required column is absent from an input table.
    #[error("schema validation failed: table {table} is missing column {column}")]
    MissingColumn {
        /// Table being validated.
        table: &'static str,
        /// Name of the missing column.
        column: &'static str,
    },

    /// Filesystem failure while reading or writing an artifact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON artifact.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
