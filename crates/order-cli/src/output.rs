//! Batch prediction CSV output.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use order_model::BatchPrediction;

pub const OUTPUT_HEADER: [&str; 5] = ["row", "label", "score", "error_kind", "error"];

/// One line per input row, in input order. Failed rows leave label and
/// score empty.
pub fn write_batch_csv<W: Write>(writer: W, batch: &BatchPrediction) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(OUTPUT_HEADER)?;
    for outcome in &batch.rows {
        let row = outcome.row.to_string();
        match &outcome.result {
            Ok(prediction) => {
                let score = prediction.score.to_string();
                csv.write_record([row.as_str(), prediction.label.as_str(), score.as_str(), "", ""])?;
            }
            Err(error) => {
                let message = error.to_string();
                csv.write_record([row.as_str(), "", "", error.kind().as_str(), message.as_str()])?;
            }
        }
    }
    csv.flush()?;
    Ok(())
}

pub fn write_batch_file(path: &Path, batch: &BatchPrediction) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("create output {}", path.display()))?;
    write_batch_csv(std::io::BufWriter::new(file), batch)
        .with_context(|| format!("write output {}", path.display()))
}
