//! Command-line parsing for the distance-sampling analysis.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! analysis code. Flags here only override fields of [`SurveyConfig`]; every
//! default lives in the config module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::SurveyConfig;
use crate::data::SimulationConfig;
use crate::domain::{AnglePolicy, KeyFunction};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dsurvey", version, about = "Line-transect distance sampling analysis")]
pub struct Cli {
    /// YAML config file; flags override its values.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load, normalize, fit detection functions, select by AIC and estimate density.
    Analyze(AnalyzeArgs),
    /// Load and normalize only; write the canonical table to CSV.
    Normalize(NormalizeArgs),
    /// Print the AIC comparison table only (useful for scripting).
    Rank(RankArgs),
    /// Write a synthetic survey in the input format.
    Simulate(SimulateArgs),
}

/// Survey file and design overrides shared by every analysis command.
#[derive(Debug, Parser, Clone)]
pub struct SurveyArgs {
    /// Survey observations (delimited text with a header row).
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// Field delimiter.
    #[arg(long)]
    pub delimiter: Option<char>,

    /// What to do with angles outside [0, 90] degrees.
    #[arg(long, value_enum)]
    pub angle_policy: Option<AnglePolicy>,

    /// Repeated visits per transect (effort multiplier).
    #[arg(long)]
    pub visits: Option<u32>,

    /// Stratum label.
    #[arg(long)]
    pub region_label: Option<String>,

    /// Stratum area (squared effort units).
    #[arg(long)]
    pub area: Option<f64>,

    /// Distance units → effort units.
    #[arg(long)]
    pub conversion_factor: Option<f64>,

    /// Header of the transect label column.
    #[arg(long)]
    pub sample_column: Option<String>,

    /// Header of the sighting angle column.
    #[arg(long)]
    pub angle_column: Option<String>,

    /// Header of the radial distance column.
    #[arg(long)]
    pub distance_column: Option<String>,

    /// Header of the cluster size column.
    #[arg(long)]
    pub size_column: Option<String>,

    /// Header of the base effort column.
    #[arg(long)]
    pub effort_column: Option<String>,
}

impl SurveyArgs {
    pub fn apply(&self, config: &mut SurveyConfig) {
        let input = &mut config.input;
        if let Some(d) = self.delimiter {
            input.delimiter = d;
        }
        if let Some(p) = self.angle_policy {
            input.angle_policy = p;
        }
        let columns = &mut input.columns;
        for (flag, target) in [
            (&self.sample_column, &mut columns.sample_label),
            (&self.angle_column, &mut columns.angle),
            (&self.distance_column, &mut columns.radial_distance),
            (&self.size_column, &mut columns.size),
            (&self.effort_column, &mut columns.effort),
        ] {
            if let Some(name) = flag {
                *target = name.clone();
            }
        }

        let design = &mut config.design;
        if let Some(v) = self.visits {
            design.visits = v;
        }
        if let Some(label) = &self.region_label {
            design.region_label = label.clone();
        }
        if let Some(a) = self.area {
            design.area = a;
        }
        if let Some(c) = self.conversion_factor {
            design.conversion_factor = c;
        }
    }
}

/// Detection-function fitting overrides.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Key functions to compare (comma separated).
    #[arg(long = "key", value_enum, value_delimiter = ',')]
    pub keys: Vec<KeyFunction>,

    /// Right truncation distance (defaults to the largest observed distance).
    #[arg(short = 'w', long)]
    pub truncation: Option<f64>,

    /// Maximum cosine adjustment terms per key.
    #[arg(long)]
    pub max_adjustments: Option<usize>,

    /// Goodness-of-fit bins.
    #[arg(long)]
    pub gof_bins: Option<usize>,

    /// Confidence level for intervals.
    #[arg(long)]
    pub confidence_level: Option<f64>,
}

impl FitArgs {
    pub fn apply(&self, config: &mut SurveyConfig) {
        let fitting = &mut config.fitting;
        if !self.keys.is_empty() {
            fitting.keys = self.keys.clone();
        }
        if self.truncation.is_some() {
            fitting.truncation = self.truncation;
        }
        if let Some(m) = self.max_adjustments {
            fitting.max_adjustments = m;
        }
        if self.gof_bins.is_some() {
            fitting.gof_bins = self.gof_bins;
        }
        if let Some(level) = self.confidence_level {
            fitting.confidence_level = level;
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    #[command(flatten)]
    pub fit: FitArgs,

    /// Export the normalized table to CSV.
    #[arg(long)]
    pub export_table: Option<PathBuf>,

    /// Export the full report to JSON.
    #[arg(long)]
    pub export_report: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    /// Output CSV for the normalized table.
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct RankArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    #[command(flatten)]
    pub fit: FitArgs,
}

/// Options for generating a synthetic survey.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output CSV.
    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 20)]
    pub transects: usize,

    /// Base transect length (effort units).
    #[arg(long, default_value_t = 5.0)]
    pub transect_length: f64,

    #[arg(long, default_value_t = 8)]
    pub visits: u32,

    /// Mean detected clusters per transect visit.
    #[arg(long, default_value_t = 1.5)]
    pub mean_detections: f64,

    /// Half-normal scale (distance units).
    #[arg(long, default_value_t = 25.0)]
    pub sigma: f64,

    /// Largest simulated perpendicular distance.
    #[arg(long, default_value_t = 100.0)]
    pub truncation: f64,

    #[arg(long, default_value_t = 1.5)]
    pub mean_cluster_size: f64,
}

impl SimulateArgs {
    pub fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            seed: self.seed,
            transects: self.transects,
            transect_length: self.transect_length,
            visits: self.visits,
            mean_detections: self.mean_detections,
            sigma: self.sigma,
            truncation: self.truncation,
            mean_cluster_size: self.mean_cluster_size,
            ..SimulationConfig::default()
        }
    }
}
