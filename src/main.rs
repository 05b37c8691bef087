// Rust Reporting Pipeline - Main executable
// Author: Gabriel Demetrios Lafis

use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, Command};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::Table;
use log::{error, info};

use rust_reporting_pipeline::{
    load::OutputFormat,
    orchestrator::{PipelineOrchestrator, PipelineResult},
    sample,
    utils::{init_logging, Config, LogFacadeSink},
};

const SAMPLE_SEED: u64 = 42;

fn print_summary(result: &PipelineResult) {
    println!();
    println!("Pipeline status: {:?}", result.status);
    println!("Duration: {:.2} seconds", result.duration_seconds);

    if let Some(summary) = &result.data_summary {
        println!("Input files processed: {}", summary.input_files_processed);
        println!("Rows: {}  Columns: {}", summary.total_rows_processed, summary.total_columns);
    }

    if !result.output_files.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED).set_header(vec!["Output", "Path"]);
        for (name, path) in &result.output_files {
            table.add_row(vec![name.clone(), path.display().to_string()]);
        }
        println!("{}", table);
    }

    if let Some(err) = &result.error {
        eprintln!("Error: {}", err);
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("Rust Reporting Pipeline")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gabriel Demetrios Lafis")
        .about("Automated reporting ETL pipeline")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (JSON or YAML)")
                .takes_value(true),
        )
        .arg(
            Arg::new("input-dir")
                .short('i')
                .long("input-dir")
                .value_name("DIR")
                .help("Directory containing input files")
                .takes_value(true),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for generated reports")
                .takes_value(true),
        )
        .arg(
            Arg::new("formats")
                .long("formats")
                .value_name("LIST")
                .help("Comma-separated output formats (csv, json, styled, summary, excel, excel_styled, excel_summary)")
                .takes_value(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (error, warn, info, debug, trace)")
                .takes_value(true),
        )
        .arg(
            Arg::new("generate-sample-data")
                .long("generate-sample-data")
                .help("Write sample input files before running"),
        )
        .get_matches();

    // Load configuration
    let mut config = match matches.value_of("config") {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config file {}", path))?,
        None => Config::default(),
    };

    if let Some(dir) = matches.value_of("input-dir") {
        config.extraction.input_directory = PathBuf::from(dir);
    }
    if let Some(dir) = matches.value_of("output-dir") {
        config.loading.output_directory = PathBuf::from(dir);
    }
    if let Some(level) = matches.value_of("log-level") {
        config.logging.level = level.to_string();
    }
    if let Some(list) = matches.value_of("formats") {
        config.loading.formats = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<OutputFormat>().map_err(|e| anyhow!(e)))
            .collect::<Result<_>>()?;
    }
    config.validate()?;

    // Initialize logging
    init_logging(config.log_level_filter(), config.logging.file.as_deref())?;

    if matches.is_present("generate-sample-data") {
        let files = sample::generate(&config.extraction.input_directory, SAMPLE_SEED)
            .context("generating sample data")?;
        info!("Generated {} sample files in {}", files.len(), config.extraction.input_directory.display());
    }

    let mut orchestrator = PipelineOrchestrator::from_config(config, LogFacadeSink::shared());
    let result = orchestrator.run();
    print_summary(&result);

    if !result.is_success() {
        error!("Pipeline finished with errors");
        process::exit(1);
    }

    Ok(())
}
