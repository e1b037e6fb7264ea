#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.toml";
pub const MANIFEST_SCHEMA: &str = "order-risk.artifact-manifest";
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

pub const ROLE_AGGREGATES: &str = "aggregates";
pub const ROLE_ENCODINGS: &str = "encodings";
pub const ROLE_SCHEMA: &str = "schema";
pub const ROLE_MODEL: &str = "model";

pub const REQUIRED_ROLES: [&str; 4] = [ROLE_AGGREGATES, ROLE_ENCODINGS, ROLE_SCHEMA, ROLE_MODEL];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest: ManifestHeader,
    pub reference: ReferenceInfo,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestHeader {
    pub schema: String,
    pub schema_version: u32,
    /// RFC 3339 build timestamp.
    pub created_at: String,
    /// Version of the tool that built the artifact.
    #[serde(default)]
    pub builder: Option<String>,
}

/// The reference dataset aggregates and encodings were fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    pub sha256: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: String,
    pub sha256: String,
    pub role: String,
}

impl Manifest {
    pub fn file_for_role(&self, role: &str) -> Option<&ManifestFile> {
        self.files.iter().find(|file| file.role == role)
    }
}
