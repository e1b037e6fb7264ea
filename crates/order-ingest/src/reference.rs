//! Reference (training corpus) loading with Polars.
//!
//! The reference dataset is read once, when an artifact is built. Every
//! column is read as a string so group keys keep their exact text
//! (`"1001"`, not `1001.0`); aggregation casts value columns itself.

use std::path::Path;

use polars::prelude::{CsvReadOptions, DataFrame, PlSmallStr, SerReader};
use tracing::{debug, info};

use order_model::PredictError;

use crate::csv_table::{delimiter_byte, ensure_unique, normalize_header};
use crate::error::{IngestError, Result};

/// Read a reference dataset and normalize its headers.
///
/// `required` names the columns the caller will aggregate or fit on; any
/// that are missing reject the file with a schema mismatch.
pub fn read_reference_frame(path: &Path, delimiter: char, required: &[&str]) -> Result<DataFrame> {
    let separator = delimiter_byte(delimiter)?;
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|options| options.with_separator(separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|source| IngestError::polars(path, source))?
        .finish()
        .map_err(|source| IngestError::polars(path, source))?;

    normalize_frame_headers(&mut df).map_err(|error| match error {
        IngestError::Polars { source, .. } => IngestError::polars(path, source),
        other => other,
    })?;
    ensure_columns(&df, required)?;
    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded reference dataset"
    );
    Ok(df)
}

/// Rename every column of `df` to its normalized form.
pub fn normalize_frame_headers(df: &mut DataFrame) -> Result<()> {
    let normalized: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| normalize_header(name.as_str()))
        .collect();
    ensure_unique(&normalized)?;
    debug!(columns = %normalized.join(", "), "normalized reference headers");
    df.set_column_names(normalized.into_iter().map(PlSmallStr::from))
        .map_err(|source| IngestError::polars("<frame>", source))
}

/// Fail with a schema mismatch naming every required column `df` lacks.
pub fn ensure_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PredictError::missing_columns(missing).into())
    }
}
