//! Reading single cells out of Polars frames.

use polars::prelude::{AnyValue, DataFrame};

/// Text of a cell, as used for group keys and categories. Null and blank
/// cells have no text. Floats print without trailing zeros.
pub fn cell_text(value: AnyValue<'_>) -> Option<String> {
    let text = match value {
        AnyValue::Null => return None,
        AnyValue::String(s) => s.trim().to_string(),
        AnyValue::StringOwned(s) => s.trim().to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric value of a cell: aggregation outputs, counts, or numeric text.
pub fn cell_number(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Float64(v) => Some(v),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// `10.0` prints as `10`, `12.50` as `12.5`.
pub fn format_numeric(v: f64) -> String {
    let s = v.to_string();
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Text of every cell in a column; `None` when the column is absent.
pub fn column_strings(df: &DataFrame, name: &str) -> Option<Vec<Option<String>>> {
    let column = df.column(name).ok()?;
    let values = (0..df.height())
        .map(|idx| column.get(idx).ok().and_then(cell_text))
        .collect();
    Some(values)
}
