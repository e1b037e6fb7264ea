use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure while turning an order into a prediction.
///
/// Every variant is deterministic for a given input and artifact, so callers
/// never retry.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PredictError {
    #[error("no {table} entry for key '{key}'")]
    UnresolvedGroupKey { table: String, key: String },

    #[error("unknown category '{value}' in column {column}")]
    UnknownCategory { column: String, value: String },

    #[error("{}", schema_mismatch_message(.missing, .unexpected))]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("{}", malformed_message(.row, .column, .value, .reason))]
    MalformedInput {
        row: Option<usize>,
        column: String,
        value: String,
        reason: String,
    },

    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
}

/// Error kinds the presentation layer renders distinct messages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnresolvedGroupKey,
    UnknownCategory,
    SchemaMismatch,
    MalformedInput,
    ModelInvocation,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::UnresolvedGroupKey,
        ErrorKind::UnknownCategory,
        ErrorKind::SchemaMismatch,
        ErrorKind::MalformedInput,
        ErrorKind::ModelInvocation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedGroupKey => "unresolved_group_key",
            Self::UnknownCategory => "unknown_category",
            Self::SchemaMismatch => "schema_mismatch",
            Self::MalformedInput => "malformed_input",
            Self::ModelInvocation => "model_invocation",
        }
    }

    /// Actionable, user-facing hint for this kind of failure.
    pub fn guidance(self) -> &'static str {
        match self {
            Self::UnresolvedGroupKey => {
                "unseen product or order: rebuild the artifact with a reference set that covers it, \
                 or use the global-default missing-key policy"
            }
            Self::UnknownCategory => "unseen category: please retrain encoder",
            Self::SchemaMismatch => "file columns do not match expected schema",
            Self::MalformedInput => "value could not be parsed: check the row for typos or blanks",
            Self::ModelInvocation => "the model failed to produce a prediction: check the artifact",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnresolvedGroupKey { .. } => ErrorKind::UnresolvedGroupKey,
            Self::UnknownCategory { .. } => ErrorKind::UnknownCategory,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
            Self::ModelInvocation(_) => ErrorKind::ModelInvocation,
        }
    }

    pub fn missing_columns<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SchemaMismatch {
            missing: missing.into_iter().map(Into::into).collect(),
            unexpected: Vec::new(),
        }
    }

    pub fn malformed(
        column: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedInput {
            row: None,
            column: column.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Attach a (zero-based) row index to a malformed-input error.
    #[must_use]
    pub fn at_row(self, index: usize) -> Self {
        match self {
            Self::MalformedInput {
                column,
                value,
                reason,
                ..
            } => Self::MalformedInput {
                row: Some(index),
                column,
                value,
                reason,
            },
            other => other,
        }
    }
}

fn schema_mismatch_message(missing: &[String], unexpected: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing [{}]", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected [{}]", unexpected.join(", ")));
    }
    if parts.is_empty() {
        "schema mismatch".to_string()
    } else {
        format!("schema mismatch: {}", parts.join("; "))
    }
}

fn malformed_message(row: &Option<usize>, column: &str, value: &str, reason: &str) -> String {
    match *row {
        Some(row) => format!("row {row}: invalid {column} '{value}': {reason}"),
        None => format!("invalid {column} '{value}': {reason}"),
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;
