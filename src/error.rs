// src/error.rs

use arrow::error::ArrowError;
use thiserror::Error;

/// Failures raised by the in-memory transform stages.
///
/// The I/O edges (loading, writing, the binary) wrap these in `anyhow`
/// with file context; the transform itself never retries.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("required column `{column}` missing from {table} table")]
    MissingColumn { column: String, table: &'static str },

    #[error("malformed value {value:?} in column `{column}` at row {row}: {reason}")]
    MalformedValue {
        column: String,
        row: usize,
        value: String,
        reason: String,
    },

    #[error("train/test schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl PrepError {
    /// Missing columns and unparseable values both mean the input export is bad.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            PrepError::MissingColumn { .. } | PrepError::MalformedValue { .. }
        )
    }

    pub(crate) fn missing(column: &str, table: &'static str) -> Self {
        PrepError::MissingColumn {
            column: column.to_string(),
            table,
        }
    }

    pub(crate) fn malformed(
        column: &str,
        row: usize,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PrepError::MalformedValue {
            column: column.to_string(),
            row,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = PrepError> = std::result::Result<T, E>;
