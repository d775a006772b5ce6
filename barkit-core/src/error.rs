//! Structured error types for dataset operations.
//!
//! These are designed to be displayable in CLI contexts and matchable by
//! library callers. Validation problems are aggregated into a single
//! [`ValidationError`]; everything else fails fast.

use crate::validate::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// Input is not table-shaped (no columns, ragged rows, mismatched lengths).
    #[error("input is not table-shaped: {0}")]
    Shape(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unsupported fill method '{0}' (expected forward, backward, linear or spline)")]
    UnsupportedMethod(String),

    #[error("invalid timezone '{0}': not a recognized IANA zone name")]
    InvalidTimezone(String),

    #[error("{method} fill requires an interpolation backend that provides it ({backend})")]
    MissingDependency { method: String, backend: String },

    #[error("split ratio must be a finite number > 0, got {0}")]
    InvalidSplitRatio(f64),

    #[error("unknown or non-fillable column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}' has type {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: String,
        found: String,
    },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("dataframe error: {0}")]
    Frame(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for DataError {
    fn from(e: csv::Error) -> Self {
        match e.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => {
                let line = pos.as_ref().map(|p| p.line()).unwrap_or(0);
                DataError::Shape(format!(
                    "csv line {line} has {len} fields, header has {expected_len}"
                ))
            }
            _ => DataError::Csv(e.to_string()),
        }
    }
}
