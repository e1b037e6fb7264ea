//! Feature schema and feature vectors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::columns;
use crate::error::{PredictError, Result};

/// Ordered set of feature names a trained model consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Build a schema, rejecting empty and duplicate names.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = BTreeSet::new();
        let mut duplicates = Vec::new();
        for name in &names {
            if name.trim().is_empty() || !seen.insert(name.as_str()) {
                duplicates.push(name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(PredictError::SchemaMismatch {
                missing: Vec::new(),
                unexpected: duplicates,
            });
        }
        Ok(Self { names })
    }

    /// The feature order produced by the standard pipeline: passthrough
    /// numerics, encoded categoricals, then derived features.
    pub fn standard() -> Self {
        let names = columns::passthrough_columns()
            .chain(columns::CATEGORICAL_COLUMNS)
            .chain(columns::DERIVED_FEATURES)
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = PredictError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.names
    }
}

/// Named feature values in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    entries: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, value)| *value).collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when names match the schema exactly, in order.
    pub fn matches(&self, schema: &FeatureSchema) -> bool {
        self.len() == schema.len() && self.names().zip(schema.names()).all(|(a, b)| a == b)
    }
}
