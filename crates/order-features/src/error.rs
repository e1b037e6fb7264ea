use order_model::PredictError;
use polars::error::PolarsError;
use thiserror::Error;

/// Errors raised while building aggregates or fitting encoders.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("aggregation over {column} failed: {source}")]
    Polars {
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("reference dataset has no usable values in column {column}")]
    EmptyColumn { column: String },

    #[error(transparent)]
    Schema(#[from] PredictError),
}

impl FeatureError {
    pub(crate) fn polars(column: impl Into<String>, source: PolarsError) -> Self {
        Self::Polars {
            column: column.into(),
            source,
        }
    }
}

pub type Result<T, E = FeatureError> = std::result::Result<T, E>;
