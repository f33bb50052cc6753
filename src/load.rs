use crate::error::Result;
use crate::extract::DATE_FORMAT;
use crate::structs::{ClassifiedDay, UniversitySummary};
use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{RecordBatch, StringArray, UInt32Array, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use csv::Writer;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fmt::Write as _;
use std::{fs::File, path::Path, sync::Arc};

/// Output columns of a university summary, in report order.
pub const SUMMARY_COLUMNS: [&str; 10] = [
    "university",
    "state",
    "enrollment",
    "freezing_days",
    "enrollment_freezing_days",
    "snow_days",
    "enrollment_snow_day_or_before",
    "freezing_rain_days",
    "enrollment_freezing_rain_day",
    "severe_days_list",
];

fn format_day_list(days: &[String]) -> String {
    format!("[{}]", days.join(", "))
}

fn summary_row(summary: &UniversitySummary) -> [String; 10] {
    [
        summary.university.clone(),
        summary.state.clone(),
        summary.enrollment.to_string(),
        summary.freezing_days.to_string(),
        summary.enrollment_freezing_days.to_string(),
        summary.snow_days.to_string(),
        summary.enrollment_snow_day_or_before.to_string(),
        summary.freezing_rain_days.to_string(),
        summary.enrollment_freezing_rain_day.to_string(),
        format_day_list(&summary.severe_days_list),
    ]
}

/// Writes university summaries to a CSV file.
///
/// `severe_days_list` is written as a single bracketed cell, e.g. `[01-05, 01-06]`.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_csv(results: &[UniversitySummary], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(SUMMARY_COLUMNS)?;
    for summary in results {
        writer.write_record(&summary_row(summary))?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes university summaries to a pretty-formatted JSON file.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_json(results: &[UniversitySummary], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

/// Writes university summaries to a Parquet file.
///
/// `severe_days_list` is stored as a `List<Utf8>` column.
///
/// # Errors
/// Returns error if file cannot be created, schema is invalid, or Arrow operations fail.
pub fn write_parquet(results: &[UniversitySummary], output_path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("university", DataType::Utf8, false),
        Field::new("state", DataType::Utf8, false),
        Field::new("enrollment", DataType::UInt32, false),
        Field::new("freezing_days", DataType::UInt32, false),
        Field::new("enrollment_freezing_days", DataType::UInt64, false),
        Field::new("snow_days", DataType::UInt32, false),
        Field::new("enrollment_snow_day_or_before", DataType::UInt64, false),
        Field::new("freezing_rain_days", DataType::UInt32, false),
        Field::new("enrollment_freezing_rain_day", DataType::UInt64, false),
        Field::new_list(
            "severe_days_list",
            Field::new("item", DataType::Utf8, true),
            false,
        ),
    ]));

    let universities =
        StringArray::from_iter_values(results.iter().map(|r| r.university.as_str()));
    let states = StringArray::from_iter_values(results.iter().map(|r| r.state.as_str()));
    let enrollments: UInt32Array = results.iter().map(|r| Some(r.enrollment)).collect();
    let freezing_days: UInt32Array = results.iter().map(|r| Some(r.freezing_days)).collect();
    let enrollment_freezing_days: UInt64Array = results
        .iter()
        .map(|r| Some(r.enrollment_freezing_days))
        .collect();
    let snow_days: UInt32Array = results.iter().map(|r| Some(r.snow_days)).collect();
    let enrollment_snow_days: UInt64Array = results
        .iter()
        .map(|r| Some(r.enrollment_snow_day_or_before))
        .collect();
    let freezing_rain_days: UInt32Array =
        results.iter().map(|r| Some(r.freezing_rain_days)).collect();
    let enrollment_freezing_rain_days: UInt64Array = results
        .iter()
        .map(|r| Some(r.enrollment_freezing_rain_day))
        .collect();

    let mut severe_days = ListBuilder::new(StringBuilder::new());
    for summary in results {
        for day in &summary.severe_days_list {
            severe_days.values().append_value(day);
        }
        severe_days.append(true);
    }

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(universities),
            Arc::new(states),
            Arc::new(enrollments),
            Arc::new(freezing_days),
            Arc::new(enrollment_freezing_days),
            Arc::new(snow_days),
            Arc::new(enrollment_snow_days),
            Arc::new(freezing_rain_days),
            Arc::new(enrollment_freezing_rain_days),
            Arc::new(severe_days.finish()),
        ],
    )?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

/// Writes the per-day classification behind the summaries, flags as 0/1.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_days_csv(days: &[ClassifiedDay], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "university",
        "date",
        "dow",
        "enrollment",
        "freezing_day",
        "snow_day_or_before",
        "freezing_rain_day",
    ])?;

    for day in days {
        let record = &day.record;
        writer.write_record(&[
            record.university.clone(),
            record.date.format(DATE_FORMAT).to_string(),
            record.date.format("%a").to_string(),
            record.enrollment.to_string(),
            u8::from(day.freezing_day).to_string(),
            u8::from(day.snow_day_or_before).to_string(),
            u8::from(day.freezing_rain_day).to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Renders summaries as a bordered, left-aligned text table.
pub fn render_table(results: &[UniversitySummary]) -> String {
    let rows: Vec<[String; 10]> = results.iter().map(summary_row).collect();

    let mut widths = SUMMARY_COLUMNS.map(|name| name.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = widths
        .iter()
        .fold(String::from("+"), |mut line, width| {
            line.push_str(&"-".repeat(*width));
            line.push('+');
            line
        });

    let mut output = String::new();
    let _ = writeln!(output, "{}", border);
    let _ = writeln!(output, "{}", table_line(SUMMARY_COLUMNS.into_iter(), &widths));
    let _ = writeln!(output, "{}", border);
    for row in &rows {
        let _ = writeln!(output, "{}", table_line(row.iter().map(String::as_str), &widths));
    }
    let _ = writeln!(output, "{}", border);
    output
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.zip(widths.iter().copied()) {
        let _ = write!(line, "{:<width$}|", cell, width = width);
    }
    line
}
