use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PredictError};

/// Model output for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label` for classifiers, the raw value for regressors.
    pub score: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Outcome for one input row of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    /// Zero-based data row index in the uploaded table.
    pub row: usize,
    pub result: Result<Prediction, PredictError>,
}

impl RowOutcome {
    pub fn ok(row: usize, prediction: Prediction) -> Self {
        Self {
            row,
            result: Ok(prediction),
        }
    }

    pub fn failed(row: usize, error: PredictError) -> Self {
        Self {
            row,
            result: Err(error),
        }
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&PredictError> {
        self.result.as_ref().err()
    }
}

/// Batch result, positionally aligned with the input rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub rows: Vec<RowOutcome>,
}

impl BatchPrediction {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn predicted_count(&self) -> usize {
        self.rows.iter().filter(|row| row.result.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.rows.len() - self.predicted_count()
    }

    /// Failed rows grouped by error kind.
    pub fn error_counts(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for error in self.rows.iter().filter_map(RowOutcome::error) {
            *counts.entry(error.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Labels per row; `None` where the row failed.
    pub fn labels(&self) -> Vec<Option<&str>> {
        self.rows
            .iter()
            .map(|row| row.prediction().map(|prediction| prediction.label.as_str()))
            .collect()
    }
}
