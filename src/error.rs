//! Error types for the Xiphos library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`XiphosError`] enum. A query either produces a complete result set or
//! fails with one of these errors; there is no partial-success mode.
//!
//! # Examples
//!
//! ```
//! use xiphos::error::{Result, XiphosError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(XiphosError::invalid_input("query vector is empty"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => assert!(e.is_invalid_input()),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::vector::source::ColumnId;

/// The main error type for Xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// The host did not supply a query vector at all.
    #[error("Invalid input: no query vector supplied")]
    MissingQueryVector,

    /// Malformed query input (empty vector, non-finite values, bad column id).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Metric name outside the recognized set.
    #[error("Invalid input: unknown metric '{0}' (expected one of euc, dot, cos)")]
    UnknownMetric(String),

    /// Negative neighbour count.
    #[error("Invalid input: k must be non-negative, got {0}")]
    InvalidK(i64),

    /// Two vectors of different dimension were compared.
    #[error("Incompatible lengths: {left} vs {right}")]
    IncompatibleLengths { left: usize, right: usize },

    /// Cosine similarity against a zero-norm vector.
    #[error("Undefined similarity: {0}")]
    UndefinedSimilarity(String),

    /// A metric sum overflowed `f64`; the score would not rank meaningfully.
    #[error("Score overflow: {0}")]
    ScoreOverflow(String),

    /// The catalog has no such column.
    #[error("Column not found: {0}")]
    ColumnNotFound(ColumnId),

    /// A backing file could not be opened.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A decoded vector does not fit the column (wrong dimension, bad values, corrupt file).
    #[error("Malformed vector: {0}")]
    MalformedVector(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with XiphosError.
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new invalid input error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        XiphosError::InvalidInput(msg.into())
    }

    /// Create a new unknown metric error.
    pub fn unknown_metric<S: Into<String>>(name: S) -> Self {
        XiphosError::UnknownMetric(name.into())
    }

    /// Create a new incompatible lengths error.
    pub fn incompatible_lengths(left: usize, right: usize) -> Self {
        XiphosError::IncompatibleLengths { left, right }
    }

    /// Create a new undefined similarity error.
    pub fn undefined_similarity<S: Into<String>>(msg: S) -> Self {
        XiphosError::UndefinedSimilarity(msg.into())
    }

    /// Create a new score overflow error.
    pub fn score_overflow<S: Into<String>>(msg: S) -> Self {
        XiphosError::ScoreOverflow(msg.into())
    }

    /// Create a new source unavailable error.
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        XiphosError::SourceUnavailable(msg.into())
    }

    /// Create a new malformed vector error.
    pub fn malformed_vector<S: Into<String>>(msg: S) -> Self {
        XiphosError::MalformedVector(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        XiphosError::Other(msg.into())
    }

    /// Whether this error was raised by query validation, before any scanning.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            XiphosError::MissingQueryVector
                | XiphosError::InvalidInput(_)
                | XiphosError::UnknownMetric(_)
                | XiphosError::InvalidK(_)
        )
    }
}
