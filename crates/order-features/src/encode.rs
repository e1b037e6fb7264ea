//! Categorical-to-integer encoding.
//!
//! Codes are assigned in sorted (byte-wise lexicographic) order of the
//! distinct trimmed values, starting at 0, so fitting the same values in any
//! order yields the same table. A fitted [`EncodingTable`] is only ever
//! applied; values it has not seen are errors.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use order_ingest::column_strings;
use order_model::columns::CATEGORICAL_COLUMNS;
use order_model::{OrderRecord, PredictError};

use crate::error::{FeatureError, Result};

/// Category to code for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnEncoding {
    codes: BTreeMap<String, u32>,
}

impl ColumnEncoding {
    pub fn code(&self, value: &str) -> Option<u32> {
        self.codes.get(value.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Categories in code order.
    pub fn categories(&self) -> Vec<&str> {
        let mut pairs: Vec<(&str, u32)> = self
            .codes
            .iter()
            .map(|(category, code)| (category.as_str(), *code))
            .collect();
        pairs.sort_by_key(|(_, code)| *code);
        pairs.into_iter().map(|(category, _)| category).collect()
    }
}

/// Fitted encodings for every categorical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingTable {
    columns: BTreeMap<String, ColumnEncoding>,
}

/// Fits [`EncodingTable`]s. Fitting happens at artifact-build time only.
pub struct CategoricalEncoder;

impl CategoricalEncoder {
    /// Fit every categorical column of the reference dataset.
    pub fn fit(reference: &DataFrame) -> Result<EncodingTable> {
        let mut columns = BTreeMap::new();
        let mut missing = Vec::new();
        for name in CATEGORICAL_COLUMNS {
            let Some(values) = column_strings(reference, name) else {
                missing.push(name);
                continue;
            };
            let encoding = Self::fit_values(values.into_iter().flatten());
            if encoding.is_empty() {
                return Err(FeatureError::EmptyColumn {
                    column: name.to_string(),
                });
            }
            columns.insert(name.to_string(), encoding);
        }
        if !missing.is_empty() {
            return Err(PredictError::missing_columns(missing).into());
        }
        Ok(EncodingTable { columns })
    }

    /// Fit one column. Blank values are not categories.
    pub fn fit_values<I, S>(values: I) -> ColumnEncoding
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values
            .into_iter()
            .map(|value| value.as_ref().trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();
        let codes = distinct.into_iter().zip(0u32..).collect();
        ColumnEncoding { codes }
    }
}

impl EncodingTable {
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnEncoding)>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, encoding)| (name.into(), encoding))
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnEncoding> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnEncoding)> {
        self.columns
            .iter()
            .map(|(name, encoding)| (name.as_str(), encoding))
    }

    /// Code for `value` in `column`.
    pub fn encode(&self, column: &str, value: &str) -> Result<u32, PredictError> {
        let encoding = self
            .columns
            .get(column)
            .ok_or_else(|| PredictError::missing_columns([column]))?;
        encoding
            .code(value)
            .ok_or_else(|| PredictError::UnknownCategory {
                column: column.to_string(),
                value: value.trim().to_string(),
            })
    }

    /// Encode every categorical field of `record`.
    pub fn apply(&self, record: &OrderRecord) -> Result<EncodedCategories, PredictError> {
        let mut codes = Vec::with_capacity(CATEGORICAL_COLUMNS.len());
        for name in CATEGORICAL_COLUMNS {
            let value = record.categorical(name).unwrap_or_default();
            codes.push((name, self.encode(name, value)?));
        }
        Ok(EncodedCategories { codes })
    }
}

/// Encoded categorical fields of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCategories {
    codes: Vec<(&'static str, u32)>,
}

impl EncodedCategories {
    pub fn entries(&self) -> &[(&'static str, u32)] {
        &self.codes
    }

    pub fn get(&self, column: &str) -> Option<u32> {
        self.codes
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, code)| *code)
    }
}
