use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use order_model::PredictError;
use tracing::debug;

use crate::error::{IngestError, Result};

/// One data row: its cells, or the reason it could not be split into cells.
pub type CsvRow = std::result::Result<Vec<String>, PredictError>;

/// A delimited table held as trimmed strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    /// Normalized (snake_case) column names.
    pub headers: Vec<String>,
    /// Data rows, each padded to `headers.len()` cells. A row that is not
    /// UTF-8 or has more cells than the header is kept as its error.
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize an export header into a canonical column name.
///
/// Lowercases ASCII, collapses every run of non-alphanumeric characters into
/// one underscore and trims leading and trailing underscores, so
/// `"Days for shipping (real)"` becomes `days_for_shipping_real`.
pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    let mut normalized = String::with_capacity(trimmed.len());
    let mut last_was_underscore = true;
    for ch in trimmed.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
            last_was_underscore = false;
        } else if !last_was_underscore {
            normalized.push('_');
            last_was_underscore = true;
        }
    }
    if normalized.ends_with('_') {
        normalized.pop();
    }
    normalized
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(IngestError::InvalidDelimiter(delimiter))
}

/// Read a delimited file. The first non-blank row is the header.
pub fn read_csv_table(path: &Path, delimiter: char) -> Result<CsvTable> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_from(file, delimiter).map_err(|error| match error {
        IngestError::Csv { source, .. } => IngestError::csv(path, source),
        other => other,
    })
}

/// Read delimited data from any reader (an upload body, a test string).
///
/// Only the header row and I/O failures reject the whole input; a bad data
/// row is recorded in place so the rows around it still get read.
pub fn read_csv_from<R: Read>(reader: R, delimiter: char) -> Result<CsvTable> {
    let delimiter = delimiter_byte(delimiter)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|source| IngestError::csv("<input>", source))?;
        if record.iter().all(|value| value.trim_ascii().is_empty()) {
            continue;
        }
        match &headers {
            None => {
                let normalized = header_row(&record)?;
                ensure_unique(&normalized)?;
                headers = Some(normalized);
            }
            Some(headers) => {
                let index = rows.len();
                let row = data_row(&record, headers, delimiter);
                rows.push(row.map_err(|error| error.at_row(index)));
            }
        }
    }
    let headers = headers.unwrap_or_default();
    let malformed = rows.iter().filter(|row| row.is_err()).count();
    debug!(
        columns = headers.len(),
        rows = rows.len(),
        malformed,
        "read delimited table"
    );
    Ok(CsvTable { headers, rows })
}

fn header_row(record: &ByteRecord) -> Result<Vec<String>> {
    record
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            std::str::from_utf8(field)
                .map(normalize_header)
                .map_err(|_| IngestError::HeaderEncoding { position: idx + 1 })
        })
        .collect()
}

fn data_row(record: &ByteRecord, headers: &[String], delimiter: u8) -> CsvRow {
    if record.len() > headers.len() {
        let extra: Vec<String> = record
            .iter()
            .skip(headers.len())
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        return Err(PredictError::malformed(
            "row",
            extra.join(&char::from(delimiter).to_string()),
            format!(
                "row has {} fields, header has {}",
                record.len(),
                headers.len()
            ),
        ));
    }
    let mut cells = Vec::with_capacity(headers.len());
    for (idx, field) in record.iter().enumerate() {
        let text = std::str::from_utf8(field).map_err(|_| {
            PredictError::malformed(
                headers[idx].as_str(),
                String::from_utf8_lossy(field),
                "not valid UTF-8 text",
            )
        })?;
        cells.push(normalize_cell(text));
    }
    cells.resize(headers.len(), String::new());
    Ok(cells)
}

pub(crate) fn ensure_unique(headers: &[String]) -> Result<()> {
    for (idx, header) in headers.iter().enumerate() {
        if !header.is_empty() && headers[..idx].contains(header) {
            return Err(IngestError::DuplicateColumn {
                column: header.clone(),
            });
        }
    }
    Ok(())
}
