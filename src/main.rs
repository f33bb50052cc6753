use chrono::NaiveDate;
use clap::Parser;
use lib::{
    AnalysisConfig, AnalysisWindow, DuplicatePolicy, InputFormat, PipelineError, SimpleLogger,
    process_data, render_table, write_csv, write_days_csv, write_json, write_parquet,
};
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input files with daily weather per university (CSV, Parquet or Open-Meteo JSON)
    #[arg(short, long, num_args = 1.., required = true)]
    input_file: Vec<PathBuf>,

    /// Input format; inferred from each file extension when omitted
    #[arg(short, long)]
    format: Option<InputFormat>,

    /// Output base name (will create dir containing .csv, .json, and .parquet files)
    #[arg(short, long, default_value = "output")]
    output: String,

    /// First day of the analysis window (inclusive)
    #[arg(long, default_value = "2026-01-01")]
    start_date: NaiveDate,

    /// Day after the analysis window (exclusive); open-ended when omitted
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// State reported on every summary row
    #[arg(long, default_value = "MO")]
    state: String,

    /// How to handle two records for the same university and date
    #[arg(long, value_enum, default_value_t = DuplicatePolicy::Reject)]
    on_duplicate: DuplicatePolicy,

    /// Also write the per-day classification
    #[arg(long, default_value_t = false)]
    daily: bool,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn main() -> Result<(), PipelineError> {
    // Initialize timer and logger
    let total_start = Instant::now();
    log::set_logger(&LOGGER)?;

    // Acquire CLI args
    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    println!("Severe weather school days");
    debug!(
        "Input files: {} | Format: {:?}",
        args.input_file.len(),
        args.format
    );
    debug!(
        "Window: {} to {} | State: {} | Duplicates: {:?}",
        args.start_date,
        args.end_date
            .map_or_else(|| "open end".to_string(), |d| d.to_string()),
        args.state,
        args.on_duplicate
    );
    if args.end_date.is_some_and(|end| end <= args.start_date) {
        warn!(
            "End date is not after start date {}, no school days will be counted",
            args.start_date
        );
    }

    let config = AnalysisConfig {
        window: AnalysisWindow::new(args.start_date, args.end_date),
        state: args.state.clone(),
        duplicates: args.on_duplicate,
    };

    println!("Starting data processing...");
    let processing_start = Instant::now();
    let output = process_data(&args.input_file, args.format, &config)?;
    let processing_time = processing_start.elapsed();
    println!(
        "Data processing completed in {:.2?} | {} school days across {} universities",
        processing_time,
        output.days.len(),
        output.summaries.len()
    );

    // Create output directory
    let output_dir = PathBuf::from(format!("./output/{}", args.output));
    fs::create_dir_all(&output_dir)?;
    println!(
        "Created output directory: {} | Writing output files...",
        output_dir.display()
    );
    let io_start = Instant::now();

    // Extract just the directory name for the file names (remove path separators)
    let output_name = args
        .output
        .split(['/', '\\'])
        .next_back()
        .unwrap_or(&args.output);
    let csv_path = output_dir.join(format!("{}.csv", output_name));
    let json_path = output_dir.join(format!("{}.json", output_name));
    let parquet_path = output_dir.join(format!("{}.parquet", output_name));

    write_csv(&output.summaries, &csv_path)?;
    write_json(&output.summaries, &json_path)?;
    write_parquet(&output.summaries, &parquet_path)?;
    debug!("  - {}", csv_path.display());
    debug!("  - {}", json_path.display());
    debug!("  - {}", parquet_path.display());

    if args.daily {
        let days_path = output_dir.join(format!("{}_days.csv", output_name));
        write_days_csv(&output.days, &days_path)?;
        debug!("  - {}", days_path.display());
    }
    println!("All files took {:.2?}", io_start.elapsed());

    if output.summaries.is_empty() {
        println!("\nNo school days found in the analysis window.");
    } else {
        println!("\n{}", render_table(&output.summaries));
    }
    if !output.rejected.is_empty() {
        println!(
            "{} input rows were rejected, see warnings above",
            output.rejected.len()
        );
    }

    println!("Pipeline completed successfully in {:.2?}", total_start.elapsed());
    Ok(())
}
