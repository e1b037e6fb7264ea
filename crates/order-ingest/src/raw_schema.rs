//! Raw upload schema check and row parsing.

use std::collections::BTreeMap;

use order_model::columns;
use order_model::{OrderRecord, PredictError};
use tracing::warn;

use crate::csv_table::CsvTable;

/// Positions of the required raw columns inside an uploaded table.
#[derive(Debug, Clone)]
pub struct RawLayout {
    positions: BTreeMap<&'static str, usize>,
    ignored: Vec<String>,
}

impl RawLayout {
    /// Bind a header row to the raw schema.
    ///
    /// Every required column must be present; otherwise the whole upload is
    /// rejected with one schema mismatch naming all missing columns. Extra
    /// columns are ignored and logged.
    pub fn bind(headers: &[String]) -> Result<Self, PredictError> {
        let mut positions = BTreeMap::new();
        let mut missing = Vec::new();
        for name in columns::raw_columns() {
            match headers.iter().position(|header| header == name) {
                Some(idx) => {
                    positions.insert(name, idx);
                }
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(PredictError::missing_columns(missing));
        }
        let ignored: Vec<String> = headers
            .iter()
            .filter(|header| !positions.contains_key(header.as_str()))
            .cloned()
            .collect();
        if !ignored.is_empty() {
            warn!(
                count = ignored.len(),
                columns = %ignored.join(", "),
                "ignoring columns outside the raw order schema"
            );
        }
        Ok(Self { positions, ignored })
    }

    pub fn for_table(table: &CsvTable) -> Result<Self, PredictError> {
        Self::bind(&table.headers)
    }

    /// Columns present in the upload but not part of the raw schema.
    pub fn ignored_columns(&self) -> &[String] {
        &self.ignored
    }

    /// Parse one data row. Errors carry the row index.
    pub fn parse_row(&self, index: usize, row: &[String]) -> Result<OrderRecord, PredictError> {
        OrderRecord::from_lookup(|name| {
            self.positions
                .get(name)
                .map(|&idx| row.get(idx).map_or("", String::as_str))
        })
        .map_err(|error| error.at_row(index))
    }
}
