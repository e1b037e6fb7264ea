//! Configuration options for feature derivation and batch serving.

use serde::{Deserialize, Serialize};

/// What to do when a group key has no aggregate entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingKeyPolicy {
    /// Fail the record with an unresolved-group-key error.
    #[default]
    Fail,
    /// Substitute the statistic computed over the whole reference column.
    GlobalDefault,
}

/// What to do with merged fields the feature schema does not name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtraFieldPolicy {
    /// Drop the field and log a warning.
    #[default]
    Warn,
    /// Fail the record with a schema mismatch.
    Reject,
}

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Options controlling the prediction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    pub missing_key_policy: MissingKeyPolicy,
    pub extra_field_policy: ExtraFieldPolicy,
    /// Rows per batch chunk. Each chunk is one model invocation.
    pub chunk_size: usize,
    /// Transform batch rows on the rayon pool.
    pub parallel: bool,
    /// Field delimiter for uploaded files.
    pub delimiter: char,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            missing_key_policy: MissingKeyPolicy::default(),
            extra_field_policy: ExtraFieldPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: true,
            delimiter: ',',
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key_policy = policy;
        self
    }

    #[must_use]
    pub fn with_extra_field_policy(mut self, policy: ExtraFieldPolicy) -> Self {
        self.extra_field_policy = policy;
        self
    }

    /// Set the chunk size (clamped to at least one row).
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Chunk size actually used; a zero from a config file counts as one.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}
