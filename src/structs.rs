use chrono::NaiveDate;
use log::{Log, Metadata, Record as LogRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Simple logger implementation
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Input row as it arrives from a file, before any validation.
///
/// Numeric fields are optional so that a blank cell or a null surfaces as a
/// rejection for that row instead of failing the whole file. A cell that is
/// present but does not parse is left as `None` and named in `unparsable`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDailyRecord {
    pub university: String,
    pub date: String,
    pub enrollment: Option<i64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub apparent_temperature_max: Option<f64>,
    pub apparent_temperature_min: Option<f64>,
    pub snowfall_sum: Option<f64>,
    pub rain_sum: Option<f64>,
    pub unparsable: Option<&'static str>,
}

/// One day of weather at one university, temperatures in °F and
/// precipitation in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeatherRecord {
    pub university: String,
    pub date: NaiveDate,
    pub enrollment: u32,
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub apparent_temperature_max: f64,
    pub apparent_temperature_min: f64,
    pub snowfall_sum: f64,
    pub rain_sum: f64,
}

/// A retained school day with its severe-weather flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedDay {
    pub record: DailyWeatherRecord,
    pub is_school_day: bool,
    pub freezing_day: bool,
    pub snow_day_or_before: bool,
    pub freezing_rain_day: bool,
}

impl ClassifiedDay {
    /// True when any of the three flags fired.
    pub fn is_severe(&self) -> bool {
        self.freezing_day || self.snow_day_or_before || self.freezing_rain_day
    }
}

/// Severe-weather impact for a single university over the analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversitySummary {
    pub university: String,
    pub state: String,
    pub enrollment: u32,
    pub freezing_days: u32,
    pub enrollment_freezing_days: u64,
    pub snow_days: u32,
    pub enrollment_snow_day_or_before: u64,
    pub freezing_rain_days: u32,
    pub enrollment_freezing_rain_day: u64,
    pub severe_days_list: Vec<String>,
}

/// Dates counted by the aggregation: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.is_none_or(|end| date < end)
    }
}

/// What to do when two records share a (university, date) key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DuplicatePolicy {
    /// Fail the whole batch
    #[default]
    Reject,
    /// Keep the record seen first in input order
    KeepFirst,
    /// Keep the record seen last in input order
    KeepLast,
}

/// Supported input file layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    Csv,
    Parquet,
    /// Saved Open-Meteo daily forecast response
    OpenMeteo,
}

impl InputFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(InputFormat::Csv),
            "parquet" | "pq" => Some(InputFormat::Parquet),
            "json" => Some(InputFormat::OpenMeteo),
            _ => None,
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub window: AnalysisWindow,
    pub state: String,
    pub duplicates: DuplicatePolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).expect("2026-01-01 is a valid date");
        Self {
            window: AnalysisWindow::new(start, None),
            state: "MO".to_string(),
            duplicates: DuplicatePolicy::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_is_start_inclusive_end_exclusive() {
        let window = AnalysisWindow::new(date(2026, 1, 1), Some(date(2026, 2, 1)));
        assert!(!window.contains(date(2025, 12, 31)));
        assert!(window.contains(date(2026, 1, 1)));
        assert!(window.contains(date(2026, 1, 31)));
        assert!(!window.contains(date(2026, 2, 1)));
    }

    #[test]
    fn open_ended_window_has_no_upper_bound() {
        let window = AnalysisWindow::new(date(2026, 1, 1), None);
        assert!(window.contains(date(2030, 6, 1)));
    }

    #[test]
    fn input_format_follows_extension() {
        assert_eq!(
            InputFormat::from_path(Path::new("data/jan.CSV")),
            Some(InputFormat::Csv)
        );
        assert_eq!(
            InputFormat::from_path(Path::new("jan.parquet")),
            Some(InputFormat::Parquet)
        );
        assert_eq!(
            InputFormat::from_path(Path::new("forecast.json")),
            Some(InputFormat::OpenMeteo)
        );
        assert_eq!(InputFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(InputFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn default_config_matches_january_missouri_run() {
        let config = AnalysisConfig::default();
        assert_eq!(config.window.start, date(2026, 1, 1));
        assert_eq!(config.window.end, None);
        assert_eq!(config.state, "MO");
        assert_eq!(config.duplicates, DuplicatePolicy::Reject);
    }
}
