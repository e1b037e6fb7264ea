//! Prediction serving.
//!
//! [`PredictionService`] holds a loaded [`order_artifact::ModelArtifact`]
//! and the pipeline options, and exposes `predict_one` for a single record
//! and `predict_batch` for an uploaded table.

pub mod service;

pub use service::{BatchChunks, PredictionService};
