//! Merge raw, derived and encoded columns into the model's feature order.

use tracing::debug;

use order_model::{ExtraFieldPolicy, FeatureSchema, FeatureVector, OrderRecord, PredictError};

use crate::derive::DerivedFeatures;
use crate::encode::EncodedCategories;

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureAssembler {
    policy: ExtraFieldPolicy,
}

impl FeatureAssembler {
    pub fn new(policy: ExtraFieldPolicy) -> Self {
        Self { policy }
    }

    /// Fields every record produces that `schema` does not name. These are
    /// the fields [`ExtraFieldPolicy::Warn`] drops from each record.
    pub fn unused_fields(schema: &FeatureSchema) -> Vec<String> {
        FeatureSchema::standard()
            .names()
            .iter()
            .filter(|name| !schema.contains(name))
            .cloned()
            .collect()
    }

    /// Produce exactly `schema`'s fields, in `schema`'s order.
    ///
    /// A schema field absent from the merged record is a schema mismatch. A
    /// merged field the schema does not name is dropped (see
    /// [`FeatureAssembler::unused_fields`]), or
    /// rejected under [`ExtraFieldPolicy::Reject`].
    pub fn assemble(
        &self,
        record: &OrderRecord,
        derived: &DerivedFeatures,
        encoded: &EncodedCategories,
        schema: &FeatureSchema,
    ) -> Result<FeatureVector, PredictError> {
        let merged = merge(record, derived, encoded);

        let missing: Vec<String> = schema
            .names()
            .iter()
            .filter(|name| !merged.iter().any(|(field, _)| *field == name.as_str()))
            .cloned()
            .collect();
        let extra: Vec<String> = merged
            .iter()
            .filter(|(field, _)| !schema.contains(field))
            .map(|(field, _)| (*field).to_string())
            .collect();

        let reject_extra = self.policy == ExtraFieldPolicy::Reject && !extra.is_empty();
        if !missing.is_empty() || reject_extra {
            return Err(PredictError::SchemaMismatch {
                missing,
                unexpected: if reject_extra { extra } else { Vec::new() },
            });
        }
        for field in &extra {
            debug!(field = %field, "dropping field not in feature schema");
        }

        let entries = schema
            .names()
            .iter()
            .filter_map(|name| {
                merged
                    .iter()
                    .find(|(field, _)| *field == name.as_str())
                    .map(|(_, value)| (name.clone(), *value))
            })
            .collect();
        Ok(FeatureVector::new(entries))
    }
}

fn merge(
    record: &OrderRecord,
    derived: &DerivedFeatures,
    encoded: &EncodedCategories,
) -> Vec<(&'static str, f64)> {
    let mut merged = record.passthrough_numerics();
    merged.extend(
        encoded
            .entries()
            .iter()
            .map(|(name, code)| (*name, f64::from(*code))),
    );
    merged.extend(derived.entries());
    merged
}
