//! The model seam: anything that turns feature vectors into predictions.

use order_model::{FeatureVector, Prediction, PredictError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("model definition is invalid: {0}")]
    InvalidModel(String),

    #[error("feature vector {index} has {actual} values, model expects {expected}")]
    FeatureCount {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("predictor returned {actual} predictions for {expected} inputs")]
    OutputCount { expected: usize, actual: usize },

    #[error("{0}")]
    Evaluation(String),
}

impl From<ModelError> for PredictError {
    fn from(error: ModelError) -> Self {
        PredictError::ModelInvocation(error.to_string())
    }
}

/// A fitted model. Implementations are shared across threads and must not
/// mutate state while predicting.
pub trait Predictor: Send + Sync {
    /// One prediction per input vector, in input order.
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Prediction>, ModelError>;

    /// Feature names the model was trained on, in order.
    fn feature_names(&self) -> &[String];

    /// Short description for logs and summaries.
    fn describe(&self) -> String {
        format!("predictor over {} features", self.feature_names().len())
    }
}
