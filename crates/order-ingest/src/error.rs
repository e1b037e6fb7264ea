//! Ingestion errors.

use std::path::PathBuf;

use order_model::PredictError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse delimited data in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to load reference dataset {path}: {source}")]
    Polars {
        path: PathBuf,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("header field {position} is not valid UTF-8")]
    HeaderEncoding { position: usize },

    #[error("delimiter {0:?} is not a single-byte character")]
    InvalidDelimiter(char),

    #[error("duplicate column '{column}' after header normalization")]
    DuplicateColumn { column: String },

    #[error(transparent)]
    Schema(#[from] PredictError),
}

impl IngestError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn polars(path: impl Into<PathBuf>, source: polars::error::PolarsError) -> Self {
        Self::Polars {
            path: path.into(),
            source,
        }
    }

    /// The schema mismatch behind this error, if that is what it is.
    pub fn as_schema_mismatch(&self) -> Option<&PredictError> {
        match self {
            Self::Schema(error @ PredictError::SchemaMismatch { .. }) => Some(error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
