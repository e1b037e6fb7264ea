//! Derived features from grouped aggregates.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use order_model::columns::{
    BENEFIT_PER_ORDER, BENEFIT_PER_PRODUCT, DELAY_ORDERED, DISCOUNT_PER_PRODUCT,
    MAX_DISCOUNT_PER_ORDER, ORDER_ITEM_DISCOUNT, ORDER_ITEM_ID, PRODUCT_NAME,
    TOTAL_DISCOUNT_PER_PRODUCT,
};
use order_model::{MissingKeyPolicy, OrderRecord, PredictError};

use crate::aggregate::{AggregateIndex, AggregateTable, Aggregator, Lookup};
use crate::error::Result;

/// Reference columns the derivation indexes are built from.
pub const AGGREGATE_SOURCE_COLUMNS: [&str; 4] = [
    PRODUCT_NAME,
    ORDER_ITEM_ID,
    ORDER_ITEM_DISCOUNT,
    BENEFIT_PER_ORDER,
];

/// The aggregate tables derivation reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationIndexes {
    pub max_discount_by_product: AggregateTable,
    pub mean_benefit_by_product: AggregateTable,
    pub discount_variance_by_product: AggregateTable,
    pub max_discount_by_order: AggregateTable,
}

impl DerivationIndexes {
    /// Build every table from the reference dataset.
    pub fn build(reference: &DataFrame) -> Result<Self> {
        let indexes = Self {
            max_discount_by_product: AggregateIndex::build(
                reference,
                PRODUCT_NAME,
                ORDER_ITEM_DISCOUNT,
                Aggregator::Max,
            )?
            .named("max_discount_by_product"),
            mean_benefit_by_product: AggregateIndex::build(
                reference,
                PRODUCT_NAME,
                BENEFIT_PER_ORDER,
                Aggregator::Mean,
            )?
            .named("mean_benefit_by_product"),
            discount_variance_by_product: AggregateIndex::build(
                reference,
                PRODUCT_NAME,
                ORDER_ITEM_DISCOUNT,
                Aggregator::Variance,
            )?
            .named("discount_variance_by_product"),
            max_discount_by_order: AggregateIndex::build(
                reference,
                ORDER_ITEM_ID,
                ORDER_ITEM_DISCOUNT,
                Aggregator::Max,
            )?
            .named("max_discount_by_order"),
        };
        Ok(indexes)
    }

    pub fn tables(&self) -> [&AggregateTable; 4] {
        [
            &self.max_discount_by_product,
            &self.mean_benefit_by_product,
            &self.discount_variance_by_product,
            &self.max_discount_by_order,
        ]
    }
}

/// Derived columns for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub delay_ordered: f64,
    pub discount_per_product: f64,
    pub benefit_per_product: f64,
    pub total_discount_per_product: f64,
    pub max_discount_per_order: f64,
}

impl DerivedFeatures {
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            (DELAY_ORDERED, self.delay_ordered),
            (DISCOUNT_PER_PRODUCT, self.discount_per_product),
            (BENEFIT_PER_PRODUCT, self.benefit_per_product),
            (TOTAL_DISCOUNT_PER_PRODUCT, self.total_discount_per_product),
            (MAX_DISCOUNT_PER_ORDER, self.max_discount_per_order),
        ]
    }
}

/// Computes derived features against read-only indexes.
#[derive(Debug, Clone, Copy)]
pub struct FeatureDeriver<'a> {
    indexes: &'a DerivationIndexes,
    policy: MissingKeyPolicy,
}

impl<'a> FeatureDeriver<'a> {
    pub fn new(indexes: &'a DerivationIndexes, policy: MissingKeyPolicy) -> Self {
        Self { indexes, policy }
    }

    pub fn derive(&self, record: &OrderRecord) -> Result<DerivedFeatures, PredictError> {
        let indexes = self.indexes;
        Ok(DerivedFeatures {
            delay_ordered: record.days_for_shipment_scheduled - record.days_for_shipping_real,
            discount_per_product: self
                .resolve(&indexes.max_discount_by_product, &record.product_name)?,
            benefit_per_product: self
                .resolve(&indexes.mean_benefit_by_product, &record.product_name)?,
            total_discount_per_product: self
                .resolve(&indexes.discount_variance_by_product, &record.product_name)?,
            max_discount_per_order: self
                .resolve(&indexes.max_discount_by_order, &record.order_item_id)?,
        })
    }

    fn resolve(&self, table: &AggregateTable, key: &str) -> Result<f64, PredictError> {
        match (table.lookup(key), self.policy) {
            (Lookup::Found(value), _) => Ok(value),
            (Lookup::Missing, MissingKeyPolicy::GlobalDefault) => {
                debug!(table = table.name(), "unseen group key, using global default");
                Ok(table.global())
            }
            (Lookup::Missing, MissingKeyPolicy::Fail) => Err(PredictError::UnresolvedGroupKey {
                table: table.name().to_string(),
                key: key.to_string(),
            }),
        }
    }
}
