use std::path::PathBuf;

use order_model::{BatchPrediction, PredictError};

/// Outcome of the `batch` command.
#[derive(Debug)]
pub struct BatchResult {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub ignored_columns: Vec<String>,
    /// `Err` when the whole file was rejected or the model failed.
    pub outcome: Result<BatchPrediction, PredictError>,
}

impl BatchResult {
    pub fn has_errors(&self) -> bool {
        match &self.outcome {
            Ok(batch) => batch.failed_count() > 0,
            Err(_) => true,
        }
    }
}
