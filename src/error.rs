use arrow_schema::ArrowError;
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Data Error: {0}")]
    Data(String),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate record for {university} on {date}")]
    DuplicateRecord { university: String, date: NaiveDate },
    #[error("Logger Error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Why a single input row was turned away during validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("missing value for `{0}`")]
    MissingField(&'static str),
    #[error("date is not in YYYY-MM-DD form")]
    InvalidDate,
    #[error("missing university name")]
    MissingUniversity,
    #[error("enrollment must be positive, got {0}")]
    NonPositiveEnrollment(i64),
    #[error("enrollment {0} is out of range")]
    EnrollmentOverflow(i64),
    #[error("`{0}` is not a number")]
    NotANumber(&'static str),
    #[error("`{0}` is not a finite number")]
    NonFinite(&'static str),
    #[error("`{0}` is negative")]
    NegativePrecipitation(&'static str),
}

/// A malformed record, keyed by the raw (university, date) values it carried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("rejected record ({university}, {date}): {reason}")]
pub struct RecordRejection {
    pub university: String,
    pub date: String,
    #[source]
    pub reason: RejectReason,
}
