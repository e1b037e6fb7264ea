//! Feature derivation and encoding for order records.
//!
//! - **aggregate**: per-group statistics over the reference dataset
//! - **derive**: derived features looked up from those statistics
//! - **encode**: categorical-to-integer encoding, fitted once
//! - **assemble**: the ordered feature vector the model consumes
//! - **pipeline**: all of the above for one record

pub mod aggregate;
pub mod assemble;
pub mod derive;
pub mod encode;
pub mod error;
pub mod pipeline;

pub use aggregate::{AggregateIndex, AggregateTable, Aggregator, Lookup, VARIANCE_DDOF};
pub use assemble::FeatureAssembler;
pub use derive::{AGGREGATE_SOURCE_COLUMNS, DerivationIndexes, DerivedFeatures, FeatureDeriver};
pub use encode::{CategoricalEncoder, ColumnEncoding, EncodedCategories, EncodingTable};
pub use error::{FeatureError, Result};
pub use pipeline::FeaturePipeline;
