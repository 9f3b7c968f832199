//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves configuration (YAML file + flag overrides)
//! - runs the requested part of the pipeline
//! - prints reports and writes optional exports

use std::fs::File;
use std::path::Path;

use clap::Parser;

use crate::cli::{AnalyzeArgs, Cli, Command, NormalizeArgs, RankArgs, SimulateArgs};
use crate::config::SurveyConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `dsurvey` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

/// Run a parsed command line.
pub fn execute(cli: Cli) -> Result<(), AppError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Analyze(args) => handle_analyze(args, config),
        Command::Normalize(args) => handle_normalize(args, config),
        Command::Rank(args) => handle_rank(args, config),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    // A logger may already be installed when embedded (tests, other binaries).
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_secs()
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<SurveyConfig, AppError> {
    match path {
        Some(path) => {
            let config = SurveyConfig::from_yaml(path)?;
            log::info!("loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(SurveyConfig::default()),
    }
}

fn handle_analyze(args: AnalyzeArgs, mut config: SurveyConfig) -> Result<(), AppError> {
    args.survey.apply(&mut config);
    args.fit.apply(&mut config);

    let run = pipeline::run_analysis(&args.survey.input, &config)?;
    println!("{}", crate::report::format_report(&run.report));

    if let Some(path) = &args.export_table {
        crate::io::write_table_csv(path, &run.prepared.table)?;
        log::info!("wrote normalized table to {}", path.display());
    }
    if let Some(path) = &args.export_report {
        crate::io::write_report_json(path, &run.report)?;
        log::info!("wrote report to {}", path.display());
    }
    Ok(())
}

fn handle_normalize(args: NormalizeArgs, mut config: SurveyConfig) -> Result<(), AppError> {
    args.survey.apply(&mut config);

    let prepared = pipeline::prepare_table(&args.survey.input, &config)?;
    crate::io::write_table_csv(&args.output, &prepared.table)?;
    print!("{}", crate::report::format_dataset(&prepared.dataset));
    println!("Wrote {} rows to {}", prepared.table.len(), args.output.display());
    Ok(())
}

fn handle_rank(args: RankArgs, mut config: SurveyConfig) -> Result<(), AppError> {
    args.survey.apply(&mut config);
    args.fit.apply(&mut config);

    let prepared = pipeline::prepare_table(&args.survey.input, &config)?;
    let selection = pipeline::select_model(&crate::fit::MaximumLikelihoodFitter, &prepared.table, &config)?;
    print!("{}", crate::report::format_rank_tsv(&selection.table));
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let rows = crate::data::simulate(&args.to_config())?;
    let file = File::create(&args.output)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", args.output.display())))?;
    crate::data::write_simulation(&rows, file)?;
    println!("Wrote {} rows to {}", rows.len(), args.output.display());
    Ok(())
}
