use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use order_artifact::VerifySummary;
use order_model::{ErrorKind, PredictError, Prediction};

use crate::types::BatchResult;

pub fn print_verify_summary(summary: &VerifySummary) {
    println!("Artifact: {}", summary.artifact_dir.display());
    println!("Built: {}", summary.created_at);
    println!(
        "Reference: {} rows, sha256 {}",
        summary.reference_rows, summary.reference_sha256
    );
    println!("Model: {}", summary.model);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Role"),
        header_cell("File"),
        header_cell("SHA-256"),
        header_cell("Status"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Center);
    for file in &summary.files {
        table.add_row(vec![
            Cell::new(&file.role)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&file.path),
            dim_cell(&file.sha256),
            Cell::new("✓")
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
    }
    println!("{table}");
    println!(
        "{} features, {} aggregate groups, {} encoded categories",
        summary.feature_count, summary.aggregate_groups, summary.encoded_categories
    );
}

pub fn print_prediction(result: &Result<Prediction, PredictError>) {
    match result {
        Ok(prediction) => {
            println!("Prediction: {}", prediction.label);
            println!("Score: {:.4}", prediction.score);
        }
        Err(error) => print_predict_error(error),
    }
}

pub fn print_batch_summary(result: &BatchResult) {
    println!("Input: {}", result.input.display());
    if let Some(path) = &result.output {
        println!("Output: {}", path.display());
    }
    if !result.ignored_columns.is_empty() {
        println!("Ignored columns: {}", result.ignored_columns.join(", "));
    }
    let batch = match &result.outcome {
        Ok(batch) => batch,
        Err(error) => {
            print_predict_error(error);
            return;
        }
    };

    let mut table = Table::new();
    table.set_header(vec![header_cell("Outcome"), header_cell("Rows")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![
        Cell::new("predicted").fg(Color::Green),
        count_cell(batch.predicted_count(), Color::Green),
    ]);
    let counts = batch.error_counts();
    for kind in ErrorKind::ALL {
        let count = counts.get(&kind).copied().unwrap_or(0);
        table.add_row(vec![Cell::new(kind.as_str()), count_cell(count, Color::Red)]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(batch.len()).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    print_label_table(batch.labels());
    print_guidance(counts.keys().copied());
}

fn print_label_table(labels: Vec<Option<&str>>) {
    let mut counts = std::collections::BTreeMap::new();
    for label in labels.into_iter().flatten() {
        *counts.entry(label).or_insert(0usize) += 1;
    }
    if counts.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Label"), header_cell("Rows")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (label, count) in counts {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    println!();
    println!("Labels:");
    println!("{table}");
}

fn print_guidance(kinds: impl Iterator<Item = ErrorKind>) {
    let mut printed = false;
    for kind in kinds {
        if !printed {
            eprintln!("Errors:");
            printed = true;
        }
        eprintln!("- {kind}: {}", kind.guidance());
    }
}

fn print_predict_error(error: &PredictError) {
    eprintln!("error: {error}");
    eprintln!("hint: {}", error.kind().guidance());
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
