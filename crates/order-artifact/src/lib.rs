//! Model artifacts.
//!
//! An artifact is a directory holding `manifest.toml` plus the fitted
//! aggregate tables, the categorical encodings, the feature schema and the
//! model itself. Every file is pinned by sha256 in the manifest and checked
//! when the artifact is loaded.

pub mod artifact;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod predictor;
pub mod tree;

pub use artifact::{ModelArtifact, VerifySummary, verify};
pub use error::ArtifactError;
pub use hash::sha256_hex;
pub use manifest::{Manifest, ManifestFile, ManifestHeader, ReferenceInfo};
pub use predictor::{ModelError, Predictor};
pub use tree::{Node, Objective, Tree, TreeEnsemble};
