//! Order data ingestion.
//!
//! Uploads are read with the `csv` crate into a string [`CsvTable`] so that
//! each row can fail on its own; the reference dataset used to build an
//! artifact is read with Polars.

pub mod csv_table;
pub mod error;
pub mod polars_utils;
pub mod raw_schema;
pub mod reference;

pub use csv_table::{CsvRow, CsvTable, normalize_header, read_csv_from, read_csv_table};
pub use error::{IngestError, Result};
pub use polars_utils::{cell_number, cell_text, column_strings, format_numeric};
pub use raw_schema::RawLayout;
pub use reference::{ensure_columns, normalize_frame_headers, read_reference_frame};
