//! The per-record transform: derive, encode, assemble.
//!
//! Single-record and batch serving both go through [`FeaturePipeline::transform`],
//! so the model always sees the same transform it was trained against.

use order_model::{FeatureSchema, FeatureVector, OrderRecord, PipelineOptions, PredictError};

use crate::assemble::FeatureAssembler;
use crate::derive::{DerivationIndexes, FeatureDeriver};
use crate::encode::EncodingTable;

#[derive(Debug, Clone, Copy)]
pub struct FeaturePipeline<'a> {
    deriver: FeatureDeriver<'a>,
    encodings: &'a EncodingTable,
    assembler: FeatureAssembler,
    schema: &'a FeatureSchema,
}

impl<'a> FeaturePipeline<'a> {
    pub fn new(
        indexes: &'a DerivationIndexes,
        encodings: &'a EncodingTable,
        schema: &'a FeatureSchema,
        options: &PipelineOptions,
    ) -> Self {
        Self {
            deriver: FeatureDeriver::new(indexes, options.missing_key_policy),
            encodings,
            assembler: FeatureAssembler::new(options.extra_field_policy),
            schema,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.schema
    }

    pub fn transform(&self, record: &OrderRecord) -> Result<FeatureVector, PredictError> {
        let derived = self.deriver.derive(record)?;
        let encoded = self.encodings.apply(record)?;
        self.assembler
            .assemble(record, &derived, &encoded, self.schema)
    }
}
