use crate::error::{PipelineError, RecordRejection, RejectReason, Result};
use crate::extract::DATE_FORMAT;
use crate::structs::{DailyWeatherRecord, DuplicatePolicy, RawDailyRecord};
use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

/// Records that passed validation, plus the ones turned away.
#[derive(Debug, Default)]
pub struct ValidatedRecords {
    pub records: Vec<DailyWeatherRecord>,
    pub rejected: Vec<RecordRejection>,
}

/// Validates raw input rows one by one and resolves duplicate keys.
///
/// A malformed row is reported in `rejected` and never aborts the batch.
/// Among the valid rows, a repeated (university, date) key is handled
/// according to `duplicates`. Accepted records keep their input order.
///
/// # Errors
/// Returns `PipelineError::DuplicateRecord` for the first repeated key when
/// `duplicates` is `DuplicatePolicy::Reject`.
pub fn validate_records(
    raw: Vec<RawDailyRecord>,
    duplicates: DuplicatePolicy,
) -> Result<ValidatedRecords> {
    let mut validated = ValidatedRecords::default();
    let mut positions: HashMap<(String, NaiveDate), usize> = HashMap::new();

    for row in raw {
        let record = match validate_record(&row) {
            Ok(record) => record,
            Err(reason) => {
                validated.rejected.push(RecordRejection {
                    university: row.university,
                    date: row.date,
                    reason,
                });
                continue;
            }
        };

        let key = (record.university.clone(), record.date);
        match positions.get(&key) {
            None => {
                positions.insert(key, validated.records.len());
                validated.records.push(record);
            }
            Some(&index) => match duplicates {
                DuplicatePolicy::Reject => {
                    return Err(PipelineError::DuplicateRecord {
                        university: record.university,
                        date: record.date,
                    });
                }
                DuplicatePolicy::KeepFirst => {
                    debug!("Dropping later duplicate for {} on {}", key.0, key.1);
                }
                DuplicatePolicy::KeepLast => {
                    debug!("Replacing earlier duplicate for {} on {}", key.0, key.1);
                    validated.records[index] = record;
                }
            },
        }
    }

    Ok(validated)
}

/// Checks a single raw row and converts it into a typed record.
pub fn validate_record(row: &RawDailyRecord) -> std::result::Result<DailyWeatherRecord, RejectReason> {
    let university = row.university.trim();
    if university.is_empty() {
        return Err(RejectReason::MissingUniversity);
    }
    let date = NaiveDate::parse_from_str(row.date.trim(), DATE_FORMAT)
        .map_err(|_| RejectReason::InvalidDate)?;
    if let Some(field) = row.unparsable {
        return Err(RejectReason::NotANumber(field));
    }

    let enrollment = row
        .enrollment
        .ok_or(RejectReason::MissingField("enrollment"))?;
    if enrollment <= 0 {
        return Err(RejectReason::NonPositiveEnrollment(enrollment));
    }
    let enrollment =
        u32::try_from(enrollment).map_err(|_| RejectReason::EnrollmentOverflow(enrollment))?;

    Ok(DailyWeatherRecord {
        university: university.to_string(),
        date,
        enrollment,
        temperature_max: temperature(row.temperature_max, "temperature_max")?,
        temperature_min: temperature(row.temperature_min, "temperature_min")?,
        apparent_temperature_max: temperature(
            row.apparent_temperature_max,
            "apparent_temperature_max",
        )?,
        apparent_temperature_min: temperature(
            row.apparent_temperature_min,
            "apparent_temperature_min",
        )?,
        snowfall_sum: precipitation(row.snowfall_sum, "snowfall_sum")?,
        rain_sum: precipitation(row.rain_sum, "rain_sum")?,
    })
}

fn temperature(value: Option<f64>, field: &'static str) -> std::result::Result<f64, RejectReason> {
    let value = value.ok_or(RejectReason::MissingField(field))?;
    if !value.is_finite() {
        return Err(RejectReason::NonFinite(field));
    }
    Ok(value)
}

fn precipitation(
    value: Option<f64>,
    field: &'static str,
) -> std::result::Result<f64, RejectReason> {
    let value = temperature(value, field)?;
    if value < 0.0 {
        return Err(RejectReason::NegativePrecipitation(field));
    }
    Ok(value)
}
