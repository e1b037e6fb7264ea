//! The two serving entry points: one record, or a whole uploaded table.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use order_artifact::ModelArtifact;
use order_features::{FeatureAssembler, FeaturePipeline};
use order_ingest::{CsvRow, CsvTable, RawLayout};
use order_model::{
    BatchPrediction, ExtraFieldPolicy, FeatureVector, OrderRecord, PipelineOptions, PredictError,
    Prediction, RowOutcome,
};

/// Serves predictions from one loaded artifact. Cheap to clone; the
/// artifact is shared and never mutated.
#[derive(Debug, Clone)]
pub struct PredictionService {
    artifact: Arc<ModelArtifact>,
    options: PipelineOptions,
}

impl PredictionService {
    /// Fields the model does not use are reported here, once, rather than
    /// for every record they are dropped from.
    pub fn new(artifact: Arc<ModelArtifact>, options: PipelineOptions) -> Self {
        if options.extra_field_policy == ExtraFieldPolicy::Warn {
            let unused = FeatureAssembler::unused_fields(&artifact.schema);
            if !unused.is_empty() {
                warn!(
                    count = unused.len(),
                    fields = %unused.join(", "),
                    "model does not use these fields; dropping them from every record"
                );
            }
        }
        Self { artifact, options }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn pipeline(&self) -> FeaturePipeline<'_> {
        let artifact = self.artifact.as_ref();
        FeaturePipeline::new(
            &artifact.indexes,
            &artifact.encodings,
            &artifact.schema,
            &self.options,
        )
    }

    /// Predict one record. The first error is returned as is.
    pub fn predict_one(&self, record: &OrderRecord) -> Result<Prediction, PredictError> {
        let vector = self.pipeline().transform(record)?;
        let mut predictions = self.invoke(std::slice::from_ref(&vector))?;
        predictions
            .pop()
            .ok_or_else(|| PredictError::ModelInvocation("predictor returned nothing".to_string()))
    }

    /// Predict a form submission of raw field values.
    pub fn predict_fields(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<Prediction, PredictError> {
        let record = OrderRecord::from_fields(fields)?;
        self.predict_one(&record)
    }

    /// Predict every row of an uploaded table.
    ///
    /// A header that lacks raw columns fails the whole table with one schema
    /// mismatch. Row-level failures are recorded per row. A predictor failure
    /// aborts the batch.
    pub fn predict_batch(&self, table: &CsvTable) -> Result<BatchPrediction, PredictError> {
        let span = info_span!("predict_batch", rows = table.len());
        let _guard = span.enter();
        let start = Instant::now();

        let mut batch = BatchPrediction {
            rows: Vec::with_capacity(table.len()),
        };
        for chunk in self.batch_chunks(table)? {
            batch.rows.extend(chunk?);
        }

        info!(
            rows = batch.len(),
            predicted = batch.predicted_count(),
            failed = batch.failed_count(),
            duration_ms = start.elapsed().as_millis(),
            "batch complete"
        );
        Ok(batch)
    }

    /// Chunk-by-chunk batch prediction, for callers that report progress.
    pub fn batch_chunks<'a>(&'a self, table: &'a CsvTable) -> Result<BatchChunks<'a>, PredictError> {
        let layout = RawLayout::for_table(table)?;
        Ok(BatchChunks {
            service: self,
            layout,
            table,
            chunk_size: self.options.effective_chunk_size(),
            next_row: 0,
            done: false,
        })
    }

    fn transform_row(
        &self,
        pipeline: &FeaturePipeline<'_>,
        layout: &RawLayout,
        index: usize,
        row: &CsvRow,
    ) -> Result<FeatureVector, PredictError> {
        let cells = row.as_ref().map_err(Clone::clone)?;
        let record = layout.parse_row(index, cells)?;
        pipeline.transform(&record)
    }

    fn run_chunk(
        &self,
        layout: &RawLayout,
        start: usize,
        rows: &[CsvRow],
    ) -> Result<Vec<RowOutcome>, PredictError> {
        let pipeline = self.pipeline();
        let staged: Vec<Result<FeatureVector, PredictError>> = if self.options.parallel {
            rows.par_iter()
                .enumerate()
                .map(|(offset, row)| self.transform_row(&pipeline, layout, start + offset, row))
                .collect()
        } else {
            rows.iter()
                .enumerate()
                .map(|(offset, row)| self.transform_row(&pipeline, layout, start + offset, row))
                .collect()
        };

        let mut vectors = Vec::with_capacity(staged.len());
        let mut failures: Vec<Option<PredictError>> = Vec::with_capacity(staged.len());
        for result in staged {
            match result {
                Ok(vector) => {
                    vectors.push(vector);
                    failures.push(None);
                }
                Err(error) => failures.push(Some(error)),
            }
        }

        let predictions = if vectors.is_empty() {
            Vec::new()
        } else {
            self.invoke(&vectors)?
        };
        debug!(
            start,
            rows = rows.len(),
            predicted = predictions.len(),
            "chunk complete"
        );

        let mut predictions = predictions.into_iter();
        let outcomes = failures
            .into_iter()
            .enumerate()
            .map(|(offset, failure)| {
                let row = start + offset;
                if let Some(error) = failure {
                    return RowOutcome::failed(row, error);
                }
                match predictions.next() {
                    Some(prediction) => RowOutcome::ok(row, prediction),
                    None => RowOutcome::failed(
                        row,
                        PredictError::ModelInvocation("no prediction for row".to_string()),
                    ),
                }
            })
            .collect();
        Ok(outcomes)
    }

    fn invoke(&self, vectors: &[FeatureVector]) -> Result<Vec<Prediction>, PredictError> {
        let predictions = self.artifact.predictor.predict(vectors)?;
        if predictions.len() != vectors.len() {
            return Err(PredictError::ModelInvocation(format!(
                "predictor returned {} predictions for {} inputs",
                predictions.len(),
                vectors.len()
            )));
        }
        Ok(predictions)
    }
}

/// Iterator over a table in chunks of `chunk_size` rows. Yields one
/// `Vec<RowOutcome>` per chunk; after a predictor error it yields that
/// error once and stops.
pub struct BatchChunks<'a> {
    service: &'a PredictionService,
    layout: RawLayout,
    table: &'a CsvTable,
    chunk_size: usize,
    next_row: usize,
    done: bool,
}

impl BatchChunks<'_> {
    pub fn total_chunks(&self) -> usize {
        self.table.len().div_ceil(self.chunk_size)
    }

    pub fn total_rows(&self) -> usize {
        self.table.len()
    }

    /// Upload columns outside the raw schema.
    pub fn ignored_columns(&self) -> &[String] {
        self.layout.ignored_columns()
    }
}

impl Iterator for BatchChunks<'_> {
    type Item = Result<Vec<RowOutcome>, PredictError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_row >= self.table.len() {
            return None;
        }
        let start = self.next_row;
        let end = (start + self.chunk_size).min(self.table.len());
        self.next_row = end;
        let result = self
            .service
            .run_chunk(&self.layout, start, &self.table.rows[start..end]);
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
