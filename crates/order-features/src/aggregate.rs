//! Per-group summary statistics over the reference dataset.
//!
//! Aggregates run as one Polars lazy `group_by` per table. Group keys are
//! compared as text; values are cast to `Float64`, and cells that do not
//! parse count as nulls.

use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::{AnyValue, Column, DataFrame, DataType, Expr, IntoLazy, NULL, col, lit};
use serde::{Deserialize, Serialize};
use tracing::debug;

use order_ingest::{cell_number, cell_text};
use order_model::PredictError;

use crate::error::{FeatureError, Result};

const KEY: &str = "__key";
const VALUE: &str = "__value";
const STAT: &str = "__stat";
const COUNT: &str = "__count";

/// Delta degrees of freedom for variance: the sample variance, as pandas
/// computes it by default.
pub const VARIANCE_DDOF: u8 = 1;

/// Statistic computed within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    Max,
    Mean,
    Variance,
}

impl Aggregator {
    fn expr(self, input: Expr) -> Expr {
        match self {
            Self::Max => input.max(),
            Self::Mean => input.mean(),
            Self::Variance => input.var(VARIANCE_DDOF),
        }
    }

    /// Final statistic for a group with at least one value. Variance of a
    /// single observation is undefined and reported as 0.
    fn settle(self, raw: Option<f64>) -> Option<f64> {
        let finite = raw.filter(|value| value.is_finite());
        match self {
            Self::Variance => Some(finite.unwrap_or(0.0)),
            Self::Max | Self::Mean => finite,
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Variance => "variance",
        })
    }
}

/// Result of an aggregate lookup. `Missing` is an ordinary outcome; the
/// caller decides how to impute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Found(f64),
    Missing,
}

impl Lookup {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing => None,
        }
    }
}

/// Group key to statistic, built once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    name: String,
    group_key: String,
    value_column: String,
    aggregator: Aggregator,
    values: BTreeMap<String, f64>,
    /// The aggregator applied to the whole value column.
    global: f64,
}

impl AggregateTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn aggregator(&self) -> Aggregator {
        self.aggregator
    }

    /// Statistic over every reference value, used as a default for unseen keys.
    pub fn global(&self) -> f64 {
        self.global
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Lookup {
        match self.values.get(key.trim()) {
            Some(value) => Lookup::Found(*value),
            None => Lookup::Missing,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Rename the table; the name shows up in unresolved-key errors.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Builder for [`AggregateTable`]s.
pub struct AggregateIndex;

impl AggregateIndex {
    /// Group `reference` by `group_key` and compute `aggregator` over
    /// `value_column` within each group.
    ///
    /// Keys are trimmed before grouping. Rows with a blank key are ignored,
    /// as are groups with no numeric value.
    pub fn build(
        reference: &DataFrame,
        group_key: &str,
        value_column: &str,
        aggregator: Aggregator,
    ) -> Result<AggregateTable> {
        let missing: Vec<&str> = [group_key, value_column]
            .into_iter()
            .filter(|name| reference.column(name).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(PredictError::missing_columns(missing).into());
        }

        let grouped = reference
            .clone()
            .lazy()
            .select([
                col(group_key)
                    .cast(DataType::String)
                    .str()
                    .strip_chars(lit(NULL))
                    .alias(KEY),
                col(value_column).cast(DataType::Float64).alias(VALUE),
            ])
            .filter(col(KEY).is_not_null().and(col(KEY).neq(lit(""))))
            .group_by([col(KEY)])
            .agg([
                aggregator.expr(col(VALUE)).alias(STAT),
                col(VALUE).count().alias(COUNT),
            ])
            .collect()
            .map_err(|source| FeatureError::polars(value_column, source))?;

        let mut values = BTreeMap::new();
        for (key, count, stat) in stat_rows(&grouped, value_column)? {
            let key = key.as_str();
            if count == 0 {
                debug!(group_key, key, value_column, "group has no numeric values");
                continue;
            }
            if let Some(value) = aggregator.settle(stat) {
                values.insert(key.to_string(), value);
            }
        }

        let global = global_stat(reference, value_column, aggregator)?;
        debug!(
            group_key,
            value_column,
            %aggregator,
            groups = values.len(),
            global,
            "built aggregate table"
        );
        Ok(AggregateTable {
            name: format!("{aggregator}_{value_column}_by_{group_key}"),
            group_key: group_key.to_string(),
            value_column: value_column.to_string(),
            aggregator,
            values,
            global,
        })
    }
}

fn stat_rows(grouped: &DataFrame, value_column: &str) -> Result<Vec<(String, u64, Option<f64>)>> {
    let keys = frame_column(grouped, KEY, value_column)?;
    let counts = frame_column(grouped, COUNT, value_column)?;
    let stats = frame_column(grouped, STAT, value_column)?;
    let mut rows = Vec::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        // Blank and null keys never match a request.
        let Some(key) = cell_text(cell(keys, idx, value_column)?) else {
            continue;
        };
        let count = cell_number(cell(counts, idx, value_column)?).unwrap_or(0.0) as u64;
        let stat = cell_number(cell(stats, idx, value_column)?);
        rows.push((key, count, stat));
    }
    Ok(rows)
}

fn frame_column<'a>(df: &'a DataFrame, name: &str, value_column: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|source| FeatureError::polars(value_column, source))
}

fn cell<'a>(column: &'a Column, idx: usize, value_column: &str) -> Result<AnyValue<'a>> {
    column
        .get(idx)
        .map_err(|source| FeatureError::polars(value_column, source))
}

fn global_stat(reference: &DataFrame, value_column: &str, aggregator: Aggregator) -> Result<f64> {
    let summary = reference
        .clone()
        .lazy()
        .select([col(value_column).cast(DataType::Float64).alias(VALUE)])
        .select([
            aggregator.expr(col(VALUE)).alias(STAT),
            col(VALUE).count().alias(COUNT),
        ])
        .collect()
        .map_err(|source| FeatureError::polars(value_column, source))?;
    let (count, stat) = summary_row(&summary, value_column)?;
    let empty = || FeatureError::EmptyColumn {
        column: value_column.to_string(),
    };
    if count == 0 {
        return Err(empty());
    }
    aggregator.settle(stat).ok_or_else(empty)
}

fn summary_row(summary: &DataFrame, value_column: &str) -> Result<(u64, Option<f64>)> {
    let count = cell(frame_column(summary, COUNT, value_column)?, 0, value_column)?;
    let stat = cell(frame_column(summary, STAT, value_column)?, 0, value_column)?;
    Ok((cell_number(count).unwrap_or(0.0) as u64, cell_number(stat)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn reference() -> DataFrame {
        df!(
            "product_name" => ["A", "A", "B", ""],
            "order_item_discount" => ["5", "10", "8", "100"],
        )
        .expect("reference frame")
    }

    #[test]
    fn max_per_group() {
        let table =
            AggregateIndex::build(&reference(), "product_name", "order_item_discount", Aggregator::Max)
                .expect("build");
        assert_eq!(table.lookup("A"), Lookup::Found(10.0));
        assert_eq!(table.lookup("B"), Lookup::Found(8.0));
        assert_eq!(table.lookup("C"), Lookup::Missing);
        assert_eq!(table.len(), 2);
        assert_eq!(table.global(), 100.0);
    }

    #[test]
    fn single_observation_variance_is_zero() {
        let table = AggregateIndex::build(
            &reference(),
            "product_name",
            "order_item_discount",
            Aggregator::Variance,
        )
        .expect("build");
        let a = table.lookup("A").value().expect("A variance");
        assert!((a - 12.5).abs() < 1e-9);
        assert_eq!(table.lookup("B"), Lookup::Found(0.0));
    }

    #[test]
    fn padded_keys_share_one_group() {
        let reference = df!(
            "product_name" => ["A", " A", "A  ", "B"],
            "order_item_discount" => ["5", "10", "15", "8"],
        )
        .expect("reference frame");
        let table = AggregateIndex::build(
            &reference,
            "product_name",
            "order_item_discount",
            Aggregator::Variance,
        )
        .expect("build");
        assert_eq!(table.len(), 2);
        let a = table.lookup("A").value().expect("A variance");
        assert!((a - 25.0).abs() < 1e-9);
    }

    #[test]
    fn missing_columns_are_reported() {
        let error =
            AggregateIndex::build(&reference(), "order_item_id", "benefit_per_order", Aggregator::Mean)
                .unwrap_err();
        assert!(matches!(
            error,
            FeatureError::Schema(PredictError::SchemaMismatch { ref missing, .. })
                if missing == &["order_item_id", "benefit_per_order"]
        ));
    }
}
