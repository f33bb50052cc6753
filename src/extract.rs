use crate::error::{PipelineError, Result};
use crate::roster::{self, MAX_LOCATION_OFFSET};
use crate::structs::{InputFormat, RawDailyRecord};
use arrow_array::{
    Array, Date32Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray,
    UInt32Array,
};
use csv::StringRecord;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const FAHRENHEIT: &str = "°F";
const INCH: &str = "inch";

/// Reads and concatenates the daily records of every input file.
///
/// # Arguments
/// * `paths` - Input files, typically one per university
/// * `format` - Forces a layout for all files; `None` infers it per file from the extension
///
/// # Errors
/// Returns the first error met while reading any file.
pub fn read_all(paths: &[PathBuf], format: Option<InputFormat>) -> Result<Vec<RawDailyRecord>> {
    let mut records = Vec::new();
    for path in paths {
        let batch = read_records(path, format)?;
        debug!("Read {} rows from {}", batch.len(), path.display());
        records.extend(batch);
    }
    Ok(records)
}

/// Reads the daily records stored in a single file.
///
/// # Errors
/// Returns `PipelineError::Data` when the format cannot be inferred or the file
/// lacks a required column, and the underlying reader error otherwise.
pub fn read_records(path: &Path, format: Option<InputFormat>) -> Result<Vec<RawDailyRecord>> {
    let format = match format {
        Some(format) => format,
        None => InputFormat::from_path(path).ok_or_else(|| {
            PipelineError::Data(format!(
                "Cannot infer input format of {}, pass --format",
                path.display()
            ))
        })?,
    };

    match format {
        InputFormat::Csv => read_csv(path),
        InputFormat::Parquet => read_parquet(path),
        InputFormat::OpenMeteo => read_open_meteo(path),
    }
}

/// Reads a headered CSV file. Columns are matched by name and unknown columns
/// are ignored.
///
/// Blank cells and cells missing from a short row become missing values. A
/// cell that does not parse as a number is recorded in
/// `RawDailyRecord::unparsable`, so only that row is rejected later.
///
/// # Errors
/// Returns `PipelineError::Data` when a required column is absent from the
/// header, and `PipelineError::Csv` when the file itself cannot be read.
pub fn read_csv(path: &Path) -> Result<Vec<RawDailyRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::Data(format!("Column not found: {}", name)))
    };
    let university = column("university")?;
    let date = column("date")?;
    let enrollment = column("enrollment")?;
    let temperature_max = column("temperature_max")?;
    let temperature_min = column("temperature_min")?;
    let apparent_max = column("apparent_temperature_max")?;
    let apparent_min = column("apparent_temperature_min")?;
    let snowfall = column("snowfall_sum")?;
    let rain = column("rain_sum")?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let text = |index: usize| row.get(index).unwrap_or_default().to_string();
        let mut unparsable = None;
        let mut record = RawDailyRecord {
            university: text(university),
            date: text(date),
            enrollment: parse_cell(&row, enrollment, "enrollment", &mut unparsable),
            temperature_max: parse_cell(&row, temperature_max, "temperature_max", &mut unparsable),
            temperature_min: parse_cell(&row, temperature_min, "temperature_min", &mut unparsable),
            apparent_temperature_max: parse_cell(
                &row,
                apparent_max,
                "apparent_temperature_max",
                &mut unparsable,
            ),
            apparent_temperature_min: parse_cell(
                &row,
                apparent_min,
                "apparent_temperature_min",
                &mut unparsable,
            ),
            snowfall_sum: parse_cell(&row, snowfall, "snowfall_sum", &mut unparsable),
            rain_sum: parse_cell(&row, rain, "rain_sum", &mut unparsable),
            unparsable: None,
        };
        record.unparsable = unparsable;
        records.push(record);
    }
    Ok(records)
}

/// Parses one numeric cell. Blank or absent cells are `None`; a cell that
/// fails to parse is also `None` and its field is noted in `unparsable`
/// (first failure wins).
fn parse_cell<T: FromStr>(
    row: &StringRecord,
    index: usize,
    field: &'static str,
    unparsable: &mut Option<&'static str>,
) -> Option<T> {
    let cell = row.get(index).filter(|cell| !cell.is_empty())?;
    match cell.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            unparsable.get_or_insert(field);
            None
        }
    }
}

/// Reads a Parquet file with the same column names as the CSV layout.
///
/// `date` may be stored as Utf8 text or as Date32, `enrollment` as Int32,
/// Int64 or UInt32. Null cells become missing values.
pub fn read_parquet(path: &Path) -> Result<Vec<RawDailyRecord>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let universities = get_column_str(&batch, "university")?;
        let dates = get_date_strings(&batch, "date")?;
        let enrollments = get_column_int(&batch, "enrollment")?;
        let temperature_max = get_column_f64(&batch, "temperature_max")?;
        let temperature_min = get_column_f64(&batch, "temperature_min")?;
        let apparent_max = get_column_f64(&batch, "apparent_temperature_max")?;
        let apparent_min = get_column_f64(&batch, "apparent_temperature_min")?;
        let snowfall = get_column_f64(&batch, "snowfall_sum")?;
        let rain = get_column_f64(&batch, "rain_sum")?;

        for (i, date) in dates.into_iter().enumerate() {
            let university = if universities.is_null(i) {
                String::new()
            } else {
                universities.value(i).to_string()
            };
            records.push(RawDailyRecord {
                university,
                date,
                enrollment: enrollments[i],
                temperature_max: value_at(temperature_max, i),
                temperature_min: value_at(temperature_min, i),
                apparent_temperature_max: value_at(apparent_max, i),
                apparent_temperature_min: value_at(apparent_min, i),
                snowfall_sum: value_at(snowfall, i),
                rain_sum: value_at(rain, i),
                unparsable: None,
            });
        }
    }
    Ok(records)
}

/// Reads a saved Open-Meteo daily forecast response.
pub fn read_open_meteo(path: &Path) -> Result<Vec<RawDailyRecord>> {
    let json = fs::read_to_string(path)?;
    parse_open_meteo(&json)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenMeteoPayload {
    Many(Vec<OpenMeteoLocation>),
    One(OpenMeteoLocation),
}

#[derive(Debug, Deserialize)]
struct OpenMeteoLocation {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    daily_units: Option<OpenMeteoDailyUnits>,
    daily: OpenMeteoDaily,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoDailyUnits {
    temperature_2m_max: Option<String>,
    temperature_2m_min: Option<String>,
    apparent_temperature_max: Option<String>,
    apparent_temperature_min: Option<String>,
    snowfall_sum: Option<String>,
    rain_sum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoDaily {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature_max: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature_min: Vec<Option<f64>>,
    #[serde(default)]
    snowfall_sum: Vec<Option<f64>>,
    #[serde(default)]
    rain_sum: Vec<Option<f64>>,
}

/// Converts an Open-Meteo daily response (one location object, or the array
/// returned for a multi-location request) into raw records.
///
/// Each location is matched to the nearest roster university, which also
/// provides the enrollment. The response must have been requested with
/// `temperature_unit=fahrenheit` and `precipitation_unit=inch`.
///
/// # Errors
/// Returns `PipelineError::Data` for unknown locations, wrong units, or
/// variables whose length differs from `daily.time`.
pub fn parse_open_meteo(json: &str) -> Result<Vec<RawDailyRecord>> {
    let locations = match serde_json::from_str::<OpenMeteoPayload>(json)? {
        OpenMeteoPayload::Many(locations) => locations,
        OpenMeteoPayload::One(location) => vec![location],
    };

    let mut records = Vec::new();
    for location in locations {
        let university = roster::nearest(location.latitude, location.longitude, MAX_LOCATION_OFFSET)
            .ok_or_else(|| {
                PipelineError::Data(format!(
                    "No university near forecast location ({}, {})",
                    location.latitude, location.longitude
                ))
            })?;
        debug!(
            "Forecast location ({}, {}) resolved to {}",
            location.latitude, location.longitude, university.name
        );

        if let Some(units) = &location.daily_units {
            check_unit(&units.temperature_2m_max, "temperature_2m_max", FAHRENHEIT)?;
            check_unit(&units.temperature_2m_min, "temperature_2m_min", FAHRENHEIT)?;
            check_unit(&units.apparent_temperature_max, "apparent_temperature_max", FAHRENHEIT)?;
            check_unit(&units.apparent_temperature_min, "apparent_temperature_min", FAHRENHEIT)?;
            check_unit(&units.snowfall_sum, "snowfall_sum", INCH)?;
            check_unit(&units.rain_sum, "rain_sum", INCH)?;
        }

        let daily = &location.daily;
        let days = daily.time.len();
        check_len(&daily.temperature_2m_max, "temperature_2m_max", days)?;
        check_len(&daily.temperature_2m_min, "temperature_2m_min", days)?;
        check_len(&daily.apparent_temperature_max, "apparent_temperature_max", days)?;
        check_len(&daily.apparent_temperature_min, "apparent_temperature_min", days)?;
        check_len(&daily.snowfall_sum, "snowfall_sum", days)?;
        check_len(&daily.rain_sum, "rain_sum", days)?;

        for (i, time) in daily.time.iter().enumerate() {
            records.push(RawDailyRecord {
                university: university.name.to_string(),
                date: time.clone(),
                enrollment: Some(i64::from(university.enrollment)),
                temperature_max: daily.temperature_2m_max[i],
                temperature_min: daily.temperature_2m_min[i],
                apparent_temperature_max: daily.apparent_temperature_max[i],
                apparent_temperature_min: daily.apparent_temperature_min[i],
                snowfall_sum: daily.snowfall_sum[i],
                rain_sum: daily.rain_sum[i],
                unparsable: None,
            });
        }
    }
    Ok(records)
}

fn check_unit(unit: &Option<String>, variable: &str, expected: &str) -> Result<()> {
    match unit.as_deref() {
        Some(found) if found != expected => Err(PipelineError::Data(format!(
            "Variable {} is in {}, expected {}",
            variable, found, expected
        ))),
        _ => Ok(()),
    }
}

fn check_len(values: &[Option<f64>], variable: &str, days: usize) -> Result<()> {
    if values.len() == days {
        Ok(())
    } else {
        Err(PipelineError::Data(format!(
            "Variable {} has {} values for {} days",
            variable,
            values.len(),
            days
        )))
    }
}

fn value_at(array: &Float64Array, i: usize) -> Option<f64> {
    (!array.is_null(i)).then(|| array.value(i))
}

fn get_column_f64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Data(format!("Column not found: {}", name)))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| PipelineError::Data(format!("Column {} is not Float64", name)))
}

fn get_column_str<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Data(format!("Column not found: {}", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::Data(format!("Column {} is not Utf8/String", name)))
}

/// Reads an integer column of any of the widths enrollment is commonly stored in.
fn get_column_int(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Data(format!("Column not found: {}", name)))?
        .as_any();

    if let Some(values) = column.downcast_ref::<Int64Array>() {
        Ok(values.iter().collect())
    } else if let Some(values) = column.downcast_ref::<Int32Array>() {
        Ok(values.iter().map(|v| v.map(i64::from)).collect())
    } else if let Some(values) = column.downcast_ref::<UInt32Array>() {
        Ok(values.iter().map(|v| v.map(i64::from)).collect())
    } else {
        Err(PipelineError::Data(format!(
            "Column {} is not Int32/Int64/UInt32",
            name
        )))
    }
}

/// Reads a date column stored either as text or as Date32, rendered as text so
/// that validation handles both the same way.
fn get_date_strings(batch: &RecordBatch, name: &str) -> Result<Vec<String>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Data(format!("Column not found: {}", name)))?
        .as_any();

    if let Some(values) = column.downcast_ref::<StringArray>() {
        Ok(values
            .iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    } else if let Some(values) = column.downcast_ref::<Date32Array>() {
        Ok((0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    String::new()
                } else {
                    values
                        .value_as_date(i)
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .unwrap_or_default()
                }
            })
            .collect())
    } else {
        Err(PipelineError::Data(format!(
            "Column {} is not Utf8 or Date32",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::io::Write;
    use std::sync::Arc;

    const HEADER: &str = "university,date,enrollment,temperature_max,temperature_min,\
apparent_temperature_max,apparent_temperature_min,snowfall_sum,rain_sum";

    #[test]
    fn csv_rows_are_read_by_header_name() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{},weather_code", HEADER).unwrap();
        writeln!(file, "Lindenwood University,2026-01-05,7288,30,20,28,18,0,0,3").unwrap();
        writeln!(file, "Lindenwood University,2026-01-06,7288,40,,38,32,0.5,0,71").unwrap();

        let records = read_records(file.path(), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].university, "Lindenwood University");
        assert_eq!(records[0].date, "2026-01-05");
        assert_eq!(records[0].enrollment, Some(7288));
        assert_eq!(records[0].temperature_max, Some(30.0));
        assert_eq!(records[1].temperature_min, None);
        assert_eq!(records[1].snowfall_sum, Some(0.5));
    }

    #[test]
    fn bad_csv_cell_is_noted_without_failing_the_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "Lindenwood University,2026-01-05,7288,n/a,20,28,18,0,0").unwrap();
        writeln!(file, "Lindenwood University,2026-01-06,7288.5,30,20,28,18,x,0").unwrap();
        writeln!(file, "Lindenwood University,2026-01-07,7288,30").unwrap();

        let records = read_csv(file.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].temperature_max, None);
        assert_eq!(records[0].temperature_min, Some(20.0));
        assert_eq!(records[0].unparsable, Some("temperature_max"));
        // first failing column is the one reported
        assert_eq!(records[1].enrollment, None);
        assert_eq!(records[1].unparsable, Some("enrollment"));
        assert_eq!(records[2].temperature_max, Some(30.0));
        assert_eq!(records[2].rain_sum, None);
        assert_eq!(records[2].unparsable, None);
    }

    #[test]
    fn csv_without_required_column_is_a_data_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "university,date,enrollment").unwrap();
        writeln!(file, "Lindenwood University,2026-01-05,7288").unwrap();

        let err = read_csv(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Data(msg) if msg.contains("temperature_max")));
    }

    #[test]
    fn unknown_extension_needs_explicit_format() {
        let err = read_records(Path::new("weather.dat"), None).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn parquet_accepts_date32_and_int32_enrollment() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("university", DataType::Utf8, false),
            Field::new("date", DataType::Date32, true),
            Field::new("enrollment", DataType::Int32, true),
            Field::new("temperature_max", DataType::Float64, true),
            Field::new("temperature_min", DataType::Float64, true),
            Field::new("apparent_temperature_max", DataType::Float64, true),
            Field::new("apparent_temperature_min", DataType::Float64, true),
            Field::new("snowfall_sum", DataType::Float64, true),
            Field::new("rain_sum", DataType::Float64, true),
        ]));
        // 2026-01-05 is day 20458 since the epoch
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["Saint Louis University - SLU"; 2])),
                Arc::new(Date32Array::from(vec![Some(20458), None])),
                Arc::new(Int32Array::from(vec![Some(17082), Some(17082)])),
                Arc::new(Float64Array::from(vec![Some(30.0), Some(31.0)])),
                Arc::new(Float64Array::from(vec![Some(20.0), None])),
                Arc::new(Float64Array::from(vec![Some(28.0), Some(29.0)])),
                Arc::new(Float64Array::from(vec![Some(18.0), Some(19.0)])),
                Arc::new(Float64Array::from(vec![Some(0.0), Some(0.0)])),
                Arc::new(Float64Array::from(vec![Some(0.1), Some(0.0)])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new()
            .suffix(".parquet")
            .tempfile()
            .unwrap();
        let mut writer = ArrowWriter::try_new(file.as_file().try_clone().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let records = read_records(file.path(), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, "2026-01-05");
        assert_eq!(records[0].enrollment, Some(17082));
        assert_eq!(records[0].rain_sum, Some(0.1));
        assert_eq!(records[1].date, "");
        assert_eq!(records[1].temperature_min, None);
    }

    #[test]
    fn open_meteo_response_is_resolved_to_roster_university() {
        let json = r#"{
            "latitude": 38.937416,
            "longitude": -92.31915,
            "daily_units": {"time": "iso8601", "temperature_2m_max": "°F",
                "apparent_temperature_max": "°F", "snowfall_sum": "inch", "rain_sum": "inch"},
            "daily": {
                "time": ["2026-01-02", "2026-01-03"],
                "temperature_2m_max": [30.1, 41.0],
                "temperature_2m_min": [18.4, 29.0],
                "apparent_temperature_max": [22.0, 35.5],
                "apparent_temperature_min": [9.8, null],
                "snowfall_sum": [0.4, 0.0],
                "rain_sum": [0.0, 0.12]
            }
        }"#;

        let records = parse_open_meteo(json).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.university == "University of Missouri - Columbia"));
        assert!(records.iter().all(|r| r.enrollment == Some(27970)));
        assert_eq!(records[0].snowfall_sum, Some(0.4));
        assert_eq!(records[1].apparent_temperature_min, None);
    }

    #[test]
    fn open_meteo_multi_location_array_is_flattened() {
        let location = |lat: f64, lon: f64| {
            format!(
                r#"{{"latitude": {lat}, "longitude": {lon}, "daily": {{
                    "time": ["2026-01-05"],
                    "temperature_2m_max": [35.0], "temperature_2m_min": [25.0],
                    "apparent_temperature_max": [30.0], "apparent_temperature_min": [20.0],
                    "snowfall_sum": [0.0], "rain_sum": [0.0]}}}}"#
            )
        };
        let json = format!("[{}, {}]", location(37.2, -93.28), location(37.31, -89.53));

        let records = parse_open_meteo(&json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].university, "Missouri State University - Springfield");
        assert_eq!(records[1].university, "Southeast Missouri State University -SEMO");
        assert_eq!(records[1].enrollment, Some(9500));
    }

    #[test]
    fn open_meteo_celsius_response_is_refused() {
        let json = r#"{"latitude": 38.94, "longitude": -92.33,
            "daily_units": {"temperature_2m_max": "°C"},
            "daily": {"time": [], "temperature_2m_max": [], "temperature_2m_min": [],
                "apparent_temperature_max": [], "apparent_temperature_min": [],
                "snowfall_sum": [], "rain_sum": []}}"#;
        let err = parse_open_meteo(json).unwrap_err();
        assert!(matches!(err, PipelineError::Data(msg) if msg.contains("°C")));
    }

    #[test]
    fn open_meteo_celsius_minimum_is_refused() {
        let json = r#"{"latitude": 38.94, "longitude": -92.33,
            "daily_units": {"temperature_2m_max": "°F", "temperature_2m_min": "°F",
                "apparent_temperature_max": "°F", "apparent_temperature_min": "°C"},
            "daily": {"time": [], "temperature_2m_max": [], "temperature_2m_min": [],
                "apparent_temperature_max": [], "apparent_temperature_min": [],
                "snowfall_sum": [], "rain_sum": []}}"#;
        let err = parse_open_meteo(json).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Data(msg) if msg.contains("apparent_temperature_min")
        ));
    }

    #[test]
    fn open_meteo_missing_variable_is_a_data_error() {
        let json = r#"{"latitude": 38.94, "longitude": -92.33,
            "daily": {"time": ["2026-01-05"], "temperature_2m_max": [30.0],
                "temperature_2m_min": [20.0], "apparent_temperature_max": [28.0],
                "apparent_temperature_min": [18.0], "snowfall_sum": [0.0]}}"#;
        let err = parse_open_meteo(json).unwrap_err();
        assert!(matches!(err, PipelineError::Data(msg) if msg.contains("rain_sum")));
    }

    #[test]
    fn open_meteo_location_outside_roster_is_rejected() {
        let json = r#"{"latitude": 47.6, "longitude": -122.3,
            "daily": {"time": []}}"#;
        let err = parse_open_meteo(json).unwrap_err();
        assert!(matches!(err, PipelineError::Data(msg) if msg.contains("No university")));
    }
}
