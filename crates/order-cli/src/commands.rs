use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, info_span, trace};

use order_artifact::{ModelArtifact, VerifySummary, verify};
use order_cli::config::form_fields;
use order_cli::logging::redact_value;
use order_cli::output::write_batch_file;
use order_ingest::read_csv_table;
use order_model::columns::{self, DERIVED_FEATURES};
use order_model::{BatchPrediction, PipelineOptions, PredictError, Prediction};
use order_predict::PredictionService;

use crate::cli::{ArtifactArgs, BatchArgs, BuildArgs, PredictArgs};
use crate::summary::apply_table_style;
use crate::types::BatchResult;

pub fn run_build(args: &BuildArgs, options: &PipelineOptions) -> Result<VerifySummary> {
    let start = Instant::now();
    ModelArtifact::build(&args.reference, &args.model, &args.out, options.delimiter)
        .with_context(|| format!("build artifact in {}", args.out.display()))?;
    let summary = verify(&args.out).context("verify written artifact")?;
    info!(
        out = %args.out.display(),
        duration_ms = start.elapsed().as_millis(),
        "build complete"
    );
    Ok(summary)
}

pub fn run_verify(args: &ArtifactArgs) -> Result<VerifySummary> {
    verify(&args.artifact).with_context(|| format!("verify {}", args.artifact.display()))
}

pub fn run_schema(args: &ArtifactArgs) -> Result<()> {
    let artifact = load_artifact(&args.artifact)?;

    let mut raw = Table::new();
    raw.set_header(vec!["Upload column", "Kind"]);
    apply_table_style(&mut raw);
    for name in columns::raw_columns() {
        let kind = if columns::is_categorical(name) {
            "categorical"
        } else if columns::KEY_COLUMNS.contains(&name) {
            "key"
        } else {
            "numeric"
        };
        raw.add_row(vec![name, kind]);
    }
    println!("{raw}");

    let mut features = Table::new();
    features.set_header(vec!["#", "Feature", "Source"]);
    apply_table_style(&mut features);
    for (idx, name) in artifact.schema.names().iter().enumerate() {
        let source = if DERIVED_FEATURES.contains(&name.as_str()) {
            "derived"
        } else if columns::is_categorical(name) {
            "encoded"
        } else {
            "passthrough"
        };
        features.add_row(vec![idx.to_string(), name.clone(), source.to_string()]);
    }
    println!("{features}");
    println!("Model: {}", artifact.predictor.describe());
    Ok(())
}

pub fn run_predict(
    args: &PredictArgs,
    options: &PipelineOptions,
) -> Result<Result<Prediction, PredictError>> {
    let span = info_span!("predict", artifact = %args.artifact.display());
    let _guard = span.enter();
    let fields = form_fields(&args.fields)?;
    for (name, value) in &fields {
        trace!(field = %name, value = %redact_value(value), "form field");
    }
    let service = PredictionService::new(load_artifact(&args.artifact)?, options.clone());
    Ok(service.predict_fields(&fields))
}

pub fn run_batch(args: &BatchArgs, options: &PipelineOptions) -> Result<BatchResult> {
    let span = info_span!("batch", input = %args.input.display());
    let _guard = span.enter();
    let start = Instant::now();

    let service = PredictionService::new(load_artifact(&args.artifact)?, options.clone());
    let table = read_csv_table(&args.input, options.delimiter)
        .with_context(|| format!("read {}", args.input.display()))?;

    let chunks = match service.batch_chunks(&table) {
        Ok(chunks) => chunks,
        Err(error) => {
            return Ok(BatchResult {
                input: args.input.clone(),
                output: None,
                ignored_columns: Vec::new(),
                outcome: Err(error),
            });
        }
    };
    let ignored_columns = chunks.ignored_columns().to_vec();

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(chunks.total_rows() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template(
            "  Predicting {bar:40.cyan/blue} {pos}/{len} rows [{elapsed_precise}]",
        )
        .context("progress template")?
        .progress_chars("##-"),
    );

    let mut batch = BatchPrediction {
        rows: Vec::with_capacity(table.len()),
    };
    let mut failure = None;
    for chunk in chunks {
        match chunk {
            Ok(rows) => {
                progress.inc(rows.len() as u64);
                for outcome in &rows {
                    if let Some(error) = outcome.error() {
                        debug!(
                            row = outcome.row,
                            kind = %error.kind(),
                            error = %redact_value(&error.to_string()),
                            "row failed"
                        );
                    }
                }
                batch.rows.extend(rows);
            }
            Err(error) => {
                failure = Some(error);
                break;
            }
        }
    }
    progress.finish_and_clear();

    let outcome = match failure {
        Some(error) => Err(error),
        None => {
            if let Some(path) = &args.output {
                write_batch_file(path, &batch)?;
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
    };
    Ok(BatchResult {
        input: args.input.clone(),
        output: args.output.clone().filter(|_| outcome.is_ok()),
        ignored_columns,
        outcome,
    })
}

fn load_artifact(dir: &Path) -> Result<Arc<ModelArtifact>> {
    let artifact =
        ModelArtifact::load(dir).with_context(|| format!("load artifact {}", dir.display()))?;
    Ok(Arc::new(artifact))
}
