#![deny(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, info_span};

use order_features::{AGGREGATE_SOURCE_COLUMNS, CategoricalEncoder, DerivationIndexes, EncodingTable};
use order_ingest::read_reference_frame;
use order_model::FeatureSchema;
use order_model::columns::CATEGORICAL_COLUMNS;

use crate::error::ArtifactError;
use crate::hash::{is_sha256_hex, sha256_hex};
use crate::manifest::{
    MANIFEST_FILE, MANIFEST_SCHEMA, MANIFEST_SCHEMA_VERSION, Manifest, ManifestFile,
    ManifestHeader, REQUIRED_ROLES, ROLE_AGGREGATES, ROLE_ENCODINGS, ROLE_MODEL, ROLE_SCHEMA,
    ReferenceInfo,
};
use crate::predictor::Predictor;
use crate::tree::TreeEnsemble;

const AGGREGATES_FILE: &str = "aggregates.json";
const ENCODINGS_FILE: &str = "encodings.json";
const SCHEMA_FILE: &str = "schema.json";
const MODEL_FILE: &str = "model.json";

#[derive(Debug, Clone, Serialize)]
pub struct VerifySummary {
    pub artifact_dir: PathBuf,
    pub created_at: String,
    pub reference_sha256: String,
    pub reference_rows: usize,
    pub files: Vec<ManifestFile>,
    pub feature_count: usize,
    pub aggregate_groups: usize,
    pub encoded_categories: usize,
    pub model: String,
}

/// Everything inference needs, loaded once and shared read-only.
#[derive(Clone)]
pub struct ModelArtifact {
    pub manifest: Manifest,
    pub schema: FeatureSchema,
    pub indexes: DerivationIndexes,
    pub encodings: EncodingTable,
    pub predictor: Arc<dyn Predictor>,
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("manifest", &self.manifest)
            .field("schema", &self.schema)
            .field("predictor", &self.predictor.describe())
            .finish_non_exhaustive()
    }
}

impl ModelArtifact {
    /// Assemble an artifact in memory. The predictor must be trained on
    /// exactly `schema`, and every schema field must be one the feature
    /// pipeline produces.
    pub fn from_parts(
        manifest: Manifest,
        schema: FeatureSchema,
        indexes: DerivationIndexes,
        encodings: EncodingTable,
        predictor: Arc<dyn Predictor>,
    ) -> Result<Self, ArtifactError> {
        check_model_fits(&schema, predictor.as_ref())?;
        Ok(Self {
            manifest,
            schema,
            indexes,
            encodings,
            predictor,
        })
    }

    /// Fit aggregates and encodings on `reference_csv`, validate the model
    /// against them, and write the artifact directory.
    pub fn build(
        reference_csv: &Path,
        model_json: &Path,
        out_dir: &Path,
        delimiter: char,
    ) -> Result<Self, ArtifactError> {
        let span = info_span!("build_artifact", out = %out_dir.display());
        let _guard = span.enter();

        let reference_bytes =
            std::fs::read(reference_csv).map_err(|e| ArtifactError::io(reference_csv, e))?;
        let required: Vec<&str> = AGGREGATE_SOURCE_COLUMNS
            .into_iter()
            .chain(CATEGORICAL_COLUMNS)
            .collect();
        let reference = read_reference_frame(reference_csv, delimiter, &required)?;
        let indexes = DerivationIndexes::build(&reference)?;
        let encodings = CategoricalEncoder::fit(&reference)?;

        let model_text =
            std::fs::read_to_string(model_json).map_err(|e| ArtifactError::io(model_json, e))?;
        let model = TreeEnsemble::from_json(&model_text)?;
        let schema = FeatureSchema::new(model.feature_names.clone())?;
        check_model_fits(&schema, &model)?;

        std::fs::create_dir_all(out_dir).map_err(|e| ArtifactError::io(out_dir, e))?;
        let files = vec![
            write_json(out_dir, AGGREGATES_FILE, ROLE_AGGREGATES, &indexes)?,
            write_json(out_dir, ENCODINGS_FILE, ROLE_ENCODINGS, &encodings)?,
            write_json(out_dir, SCHEMA_FILE, ROLE_SCHEMA, &schema)?,
            write_json(out_dir, MODEL_FILE, ROLE_MODEL, &model)?,
        ];

        let manifest = Manifest {
            manifest: ManifestHeader {
                schema: MANIFEST_SCHEMA.to_string(),
                schema_version: MANIFEST_SCHEMA_VERSION,
                created_at: chrono::Utc::now().to_rfc3339(),
                builder: Some(format!("order-artifact {}", env!("CARGO_PKG_VERSION"))),
            },
            reference: ReferenceInfo {
                sha256: sha256_hex(&reference_bytes),
                rows: reference.height(),
            },
            files,
        };
        let manifest_path = out_dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, toml::to_string_pretty(&manifest)?)
            .map_err(|e| ArtifactError::io(&manifest_path, e))?;

        info!(
            reference_rows = manifest.reference.rows,
            features = schema.len(),
            "artifact written"
        );
        Self::from_parts(manifest, schema, indexes, encodings, Arc::new(model))
    }

    /// Load an artifact directory, verifying every file against the manifest.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        Self::verify_and_load(dir).map(|(artifact, _)| artifact)
    }

    pub fn verify_and_load(dir: &Path) -> Result<(Self, VerifySummary), ArtifactError> {
        let span = info_span!("load_artifact", dir = %dir.display());
        let _guard = span.enter();

        let manifest = load_manifest(&dir.join(MANIFEST_FILE))?;
        validate_manifest(&manifest)?;

        let mut files = manifest.files.clone();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        for file in &files {
            verify_file(dir, file)?;
        }

        let indexes: DerivationIndexes = read_json(&resolve_role_path(dir, &manifest, ROLE_AGGREGATES)?)?;
        let encodings: EncodingTable = read_json(&resolve_role_path(dir, &manifest, ROLE_ENCODINGS)?)?;
        let schema: FeatureSchema = read_json(&resolve_role_path(dir, &manifest, ROLE_SCHEMA)?)?;
        let model_path = resolve_role_path(dir, &manifest, ROLE_MODEL)?;
        let model_text =
            std::fs::read_to_string(&model_path).map_err(|e| ArtifactError::io(&model_path, e))?;
        let model = TreeEnsemble::from_json(&model_text)?;

        let summary = VerifySummary {
            artifact_dir: dir.to_path_buf(),
            created_at: manifest.manifest.created_at.clone(),
            reference_sha256: manifest.reference.sha256.clone(),
            reference_rows: manifest.reference.rows,
            files,
            feature_count: schema.len(),
            aggregate_groups: indexes.tables().iter().map(|table| table.len()).sum(),
            encoded_categories: encodings.columns().map(|(_, column)| column.len()).sum(),
            model: model.describe(),
        };
        let artifact = Self::from_parts(manifest, schema, indexes, encodings, Arc::new(model))?;
        info!(
            files = summary.files.len(),
            features = summary.feature_count,
            "artifact verified"
        );
        Ok((artifact, summary))
    }
}

/// Re-check an artifact directory without keeping it.
pub fn verify(dir: &Path) -> Result<VerifySummary, ArtifactError> {
    ModelArtifact::verify_and_load(dir).map(|(_, summary)| summary)
}

fn check_model_fits(schema: &FeatureSchema, predictor: &dyn Predictor) -> Result<(), ArtifactError> {
    if predictor.feature_names() != schema.names() {
        return Err(ArtifactError::IncompatibleModel(format!(
            "model features [{}] differ from schema [{}]",
            predictor.feature_names().join(", "),
            schema.names().join(", ")
        )));
    }
    let producible = FeatureSchema::standard();
    let unknown: Vec<&str> = schema
        .names()
        .iter()
        .map(String::as_str)
        .filter(|name| !producible.contains(name))
        .collect();
    if !unknown.is_empty() {
        return Err(ArtifactError::IncompatibleModel(format!(
            "features not produced by the pipeline: {}",
            unknown.join(", ")
        )));
    }
    Ok(())
}

fn write_json<T: Serialize>(
    dir: &Path,
    file_name: &str,
    role: &str,
    value: &T,
) -> Result<ManifestFile, ArtifactError> {
    let path = dir.join(file_name);
    let mut text =
        serde_json::to_string_pretty(value).map_err(|e| ArtifactError::json(&path, e))?;
    text.push('\n');
    std::fs::write(&path, &text).map_err(|e| ArtifactError::io(&path, e))?;
    debug!(path = %path.display(), role, "wrote artifact file");
    Ok(ManifestFile {
        path: file_name.to_string(),
        sha256: sha256_hex(text.as_bytes()),
        role: role.to_string(),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| ArtifactError::json(path, e))
}

fn load_manifest(path: &Path) -> Result<Manifest, ArtifactError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    toml::from_str(&contents).map_err(|e| ArtifactError::Toml {
        path: path.to_path_buf(),
        source: e,
    })
}

fn validate_manifest(manifest: &Manifest) -> Result<(), ArtifactError> {
    if manifest.manifest.schema != MANIFEST_SCHEMA {
        return Err(ArtifactError::ManifestRejected {
            message: format!("unsupported schema: {}", manifest.manifest.schema),
        });
    }
    if manifest.manifest.schema_version != MANIFEST_SCHEMA_VERSION {
        return Err(ArtifactError::ManifestRejected {
            message: format!(
                "unsupported schema_version: {}",
                manifest.manifest.schema_version
            ),
        });
    }
    if chrono::DateTime::parse_from_rfc3339(&manifest.manifest.created_at).is_err() {
        return Err(ArtifactError::ManifestRejected {
            message: format!("created_at is not RFC 3339: {}", manifest.manifest.created_at),
        });
    }
    validate_sha(&manifest.reference.sha256, "reference")?;

    let mut roles: BTreeSet<&str> = BTreeSet::new();
    for file in &manifest.files {
        if !roles.insert(file.role.as_str()) {
            return Err(ArtifactError::RoleRepeated {
                role: file.role.clone(),
            });
        }
        validate_sha(&file.sha256, &file.path)?;
        validate_path(&file.path)?;
    }
    for role in REQUIRED_ROLES {
        if !roles.contains(role) {
            return Err(ArtifactError::RoleMissing {
                role: role.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_sha(value: &str, path: &str) -> Result<(), ArtifactError> {
    if is_sha256_hex(value) {
        Ok(())
    } else {
        Err(ArtifactError::BadDigest {
            path: PathBuf::from(path),
            message: "expected 64 hex characters".to_string(),
        })
    }
}

fn validate_path(path: &str) -> Result<(), ArtifactError> {
    let candidate = Path::new(path);
    let escapes = candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.trim().is_empty() || escapes {
        return Err(ArtifactError::BadPath {
            path: candidate.to_path_buf(),
            message: "must be a relative path inside the artifact".to_string(),
        });
    }
    Ok(())
}

fn verify_file(dir: &Path, file: &ManifestFile) -> Result<(), ArtifactError> {
    let full_path = dir.join(&file.path);
    let bytes = std::fs::read(&full_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::FileMissing {
                path: full_path.clone(),
            }
        } else {
            ArtifactError::io(full_path.clone(), e)
        }
    })?;

    let actual = sha256_hex(&bytes);
    let expected = file.sha256.to_ascii_lowercase();
    if actual != expected {
        return Err(ArtifactError::Tampered {
            path: full_path,
            expected,
            actual,
        });
    }
    debug!(path = %file.path, role = %file.role, "verified");
    Ok(())
}

fn resolve_role_path(
    dir: &Path,
    manifest: &Manifest,
    role: &str,
) -> Result<PathBuf, ArtifactError> {
    let file = manifest
        .file_for_role(role)
        .ok_or_else(|| ArtifactError::RoleMissing {
            role: role.to_string(),
        })?;
    Ok(dir.join(&file.path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_must_stay_inside_artifact() {
        assert!(validate_path("model.json").is_ok());
        assert!(validate_path("./model.json").is_ok());
        assert!(validate_path("../model.json").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("").is_err());
    }

    #[test]
    fn short_sha_is_rejected() {
        assert!(matches!(
            validate_sha("abc", "model.json"),
            Err(ArtifactError::BadDigest { .. })
        ));
    }
}
