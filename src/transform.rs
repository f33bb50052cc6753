use crate::error::{RecordRejection, Result};
use crate::extract::read_all;
use crate::structs::{
    AnalysisConfig, AnalysisWindow, ClassifiedDay, DailyWeatherRecord, InputFormat,
    UniversitySummary,
};
use crate::validate::validate_records;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Average temperature (°F) below which a day counts as freezing.
pub const FREEZING_POINT_F: f64 = 32.0;

/// Label format for entries of `severe_days_list`.
pub const DAY_LABEL_FORMAT: &str = "%m-%d";

/// Everything a pipeline run produces.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub summaries: Vec<UniversitySummary>,
    pub days: Vec<ClassifiedDay>,
    pub rejected: Vec<RecordRejection>,
}

/// Reads, validates and summarizes severe-weather school days.
///
/// # Arguments
///
/// * `input_files` - Files holding daily records, possibly one per university
/// * `format` - Input layout, or `None` to infer it from each file extension
/// * `config` - Analysis window, reported state and duplicate handling
///
/// # Returns
///
/// Returns a `PipelineOutput` with one summary per university that has at
/// least one school day in the window, the classified days behind those
/// summaries, and the input rows that failed validation.
///
/// # Errors
///
/// Returns `PipelineError` if:
/// - An input file cannot be read or lacks a required column
/// - Two records share a (university, date) key under `DuplicatePolicy::Reject`
pub fn process_data(
    input_files: &[PathBuf],
    format: Option<InputFormat>,
    config: &AnalysisConfig,
) -> Result<PipelineOutput> {
    let raw = read_all(input_files, format)?;
    let total_rows = raw.len();

    let validated = validate_records(raw, config.duplicates)?;
    for rejection in &validated.rejected {
        warn!("{}", rejection);
    }
    println!(
        "Read {} rows, {} valid, {} rejected",
        total_rows,
        validated.records.len(),
        validated.rejected.len()
    );

    let (days, summaries) = summarize(&validated.records, config);
    Ok(PipelineOutput {
        summaries,
        days,
        rejected: validated.rejected,
    })
}

/// Runs the filter, classify and aggregate stages over validated records.
///
/// `records` must hold at most one record per (university, date); it is also
/// the set consulted for previous-day snowfall, so it may extend past the
/// analysis window.
pub fn summarize(
    records: &[DailyWeatherRecord],
    config: &AnalysisConfig,
) -> (Vec<ClassifiedDay>, Vec<UniversitySummary>) {
    let index = index_by_day(records);
    let school_days = filter_school_days(records, &config.window);
    debug!(
        "{} of {} records are school days in the window",
        school_days.len(),
        records.len()
    );

    let days = classify_days(&school_days, &index);
    let summaries = aggregate_universities(&days, &config.state);
    debug!("Summarized {} universities", summaries.len());
    (days, summaries)
}

pub fn is_school_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Keeps the weekday records whose date falls inside `window`.
pub fn filter_school_days<'a>(
    records: &'a [DailyWeatherRecord],
    window: &AnalysisWindow,
) -> Vec<&'a DailyWeatherRecord> {
    records
        .iter()
        .filter(|r| window.contains(r.date) && is_school_day(r.date))
        .collect()
}

/// Lookup of records by (university, date).
pub type DayIndex<'a> = HashMap<(&'a str, NaiveDate), &'a DailyWeatherRecord>;

/// Indexes every record, weekends and out-of-window days included.
pub fn index_by_day(records: &[DailyWeatherRecord]) -> DayIndex<'_> {
    records
        .iter()
        .map(|r| ((r.university.as_str(), r.date), r))
        .collect()
}

/// True when the mean of `max` and `min` is strictly below freezing.
pub fn is_freezing(max: f64, min: f64) -> bool {
    (max + min) / 2.0 < FREEZING_POINT_F
}

/// Largest snowfall on the calendar days leading into `record.date`: the
/// previous day, or for a Monday both days of the weekend before it.
///
/// The Monday case is wider than a strict one-day look-back so that
/// Saturday snow still counts on Monday; Friday snow never does.
/// Days without a record count as no snowfall.
pub fn previous_snowfall(record: &DailyWeatherRecord, index: &DayIndex<'_>) -> f64 {
    let lookback = if record.date.weekday() == Weekday::Mon { 2 } else { 1 };
    (1..=lookback)
        .filter_map(|n| record.date.checked_sub_days(Days::new(n)))
        .filter_map(|day| index.get(&(record.university.as_str(), day)))
        .map(|previous| previous.snowfall_sum)
        .fold(0.0, f64::max)
}

/// Derives the severe-weather flags of one record.
pub fn classify_day(record: &DailyWeatherRecord, index: &DayIndex<'_>) -> ClassifiedDay {
    let lingering_snow = previous_snowfall(record, index);

    let freezing_day = is_freezing(record.temperature_max, record.temperature_min)
        || is_freezing(
            record.apparent_temperature_max,
            record.apparent_temperature_min,
        );
    let snow_day_or_before = record.snowfall_sum > 0.0 || lingering_snow > 0.0;
    let freezing_rain_day = record.rain_sum > 0.0 && freezing_day;

    ClassifiedDay {
        record: record.clone(),
        is_school_day: is_school_day(record.date),
        freezing_day,
        snow_day_or_before,
        freezing_rain_day,
    }
}

/// Classifies records in parallel, preserving their order.
pub fn classify_days(
    records: &[&DailyWeatherRecord],
    index: &DayIndex<'_>,
) -> Vec<ClassifiedDay> {
    records
        .par_iter()
        .map(|record| classify_day(record, index))
        .collect()
}

#[derive(Default)]
struct Accumulator {
    freezing_days: u32,
    snow_days: u32,
    freezing_rain_days: u32,
    severe_dates: Vec<NaiveDate>,
}

/// Folds classified days into one summary per (university, enrollment).
///
/// Rows come out ordered by university, then enrollment. `severe_days_list`
/// is in chronological order.
pub fn aggregate_universities(days: &[ClassifiedDay], state: &str) -> Vec<UniversitySummary> {
    let mut groups: BTreeMap<(&str, u32), Accumulator> = BTreeMap::new();

    for day in days {
        let record = &day.record;
        let acc = groups
            .entry((record.university.as_str(), record.enrollment))
            .or_default();
        acc.freezing_days += u32::from(day.freezing_day);
        acc.snow_days += u32::from(day.snow_day_or_before);
        acc.freezing_rain_days += u32::from(day.freezing_rain_day);
        if day.is_severe() {
            acc.severe_dates.push(record.date);
        }
    }

    let mut previous: Option<&str> = None;
    for &(university, enrollment) in groups.keys() {
        if previous == Some(university) {
            warn!(
                "{} has more than one enrollment value, reported on separate rows (saw {})",
                university, enrollment
            );
        }
        previous = Some(university);
    }

    groups
        .into_iter()
        .map(|((university, enrollment), mut acc)| {
            acc.severe_dates.sort_unstable();
            let students = u64::from(enrollment);
            UniversitySummary {
                university: university.to_string(),
                state: state.to_string(),
                enrollment,
                freezing_days: acc.freezing_days,
                enrollment_freezing_days: u64::from(acc.freezing_days) * students,
                snow_days: acc.snow_days,
                enrollment_snow_day_or_before: u64::from(acc.snow_days) * students,
                freezing_rain_days: acc.freezing_rain_days,
                enrollment_freezing_rain_day: u64::from(acc.freezing_rain_days) * students,
                severe_days_list: acc
                    .severe_dates
                    .iter()
                    .map(|d| d.format(DAY_LABEL_FORMAT).to_string())
                    .collect(),
            }
        })
        .collect()
}
