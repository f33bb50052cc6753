pub mod error;
pub mod extract;
pub mod load;
pub mod roster;
pub mod structs;
pub mod transform;
pub mod validate;

// Re-export public API
pub use error::{PipelineError, RecordRejection, RejectReason, Result};
pub use extract::{read_all, read_records};
pub use load::{render_table, write_csv, write_days_csv, write_json, write_parquet};
pub use structs::{
    AnalysisConfig, AnalysisWindow, ClassifiedDay, DailyWeatherRecord, DuplicatePolicy,
    InputFormat, RawDailyRecord, SimpleLogger, UniversitySummary,
};
pub use transform::{PipelineOutput, process_data, summarize};
pub use validate::{ValidatedRecords, validate_records};
