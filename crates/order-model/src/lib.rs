//! Core types shared by the order feature pipeline.
//!
//! - **columns**: canonical raw column and feature names
//! - **record**: the raw [`OrderRecord`]
//! - **schema**: [`FeatureSchema`] and [`FeatureVector`]
//! - **prediction**: [`Prediction`] and per-row batch outcomes
//! - **error**: [`PredictError`] and its user-facing [`ErrorKind`]
//! - **options**: [`PipelineOptions`]

pub mod columns;
pub mod error;
pub mod options;
pub mod prediction;
pub mod record;
pub mod schema;

pub use error::{ErrorKind, PredictError, Result};
pub use options::{ExtraFieldPolicy, MissingKeyPolicy, PipelineOptions};
pub use prediction::{BatchPrediction, Prediction, RowOutcome};
pub use record::{OrderRecord, parse_number};
pub use schema::{FeatureSchema, FeatureVector};
