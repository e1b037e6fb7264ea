#![deny(unsafe_code)]

use std::path::PathBuf;

use order_features::FeatureError;
use order_ingest::IngestError;
use order_model::PredictError;

use crate::predictor::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot access artifact file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact manifest {path} is not valid TOML: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize artifact manifest: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact manifest rejected: {message}")]
    ManifestRejected { message: String },

    #[error("artifact has no `{role}` file")]
    RoleMissing { role: String },

    #[error("artifact lists more than one `{role}` file")]
    RoleRepeated { role: String },

    #[error("digest recorded for {path} is unusable: {message}")]
    BadDigest { path: PathBuf, message: String },

    #[error("artifact file path {path} rejected: {message}")]
    BadPath { path: PathBuf, message: String },

    #[error("artifact file {path} is missing")]
    FileMissing { path: PathBuf },

    #[error("{path} was modified after build: digest {actual}, manifest records {expected}")]
    Tampered {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("model does not fit the feature pipeline: {0}")]
    IncompatibleModel(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error(transparent)]
    Schema(#[from] PredictError),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
