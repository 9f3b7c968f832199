//! Configuration for a survey analysis.
//!
//! Every field has a default equal to the constants of the reference survey
//! (eight visits per transect, a single `GPNP` stratum of 10.8 km², distances in
//! metres against effort in kilometres). A YAML file can override any subset;
//! CLI flags are applied on top of that.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AnglePolicy, KeyFunction};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Source header for each input role.
///
/// Matching is case-insensitive. Optional roles may be set to `null` when the
/// file has no such column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_date_column")]
    pub date: Option<String>,
    #[serde(default = "default_sample_column")]
    pub sample_label: String,
    #[serde(default = "default_replicate_column")]
    pub replicate: Option<String>,
    #[serde(default = "default_angle_column")]
    pub angle: String,
    #[serde(default = "default_distance_column")]
    pub radial_distance: String,
    #[serde(default = "default_size_column")]
    pub size: String,
    #[serde(default = "default_effort_column")]
    pub effort: String,
}

fn default_date_column() -> Option<String> {
    Some("date".to_string())
}

fn default_sample_column() -> String {
    "transect".to_string()
}

fn default_replicate_column() -> Option<String> {
    Some("replicate".to_string())
}

fn default_angle_column() -> String {
    "angle".to_string()
}

fn default_distance_column() -> String {
    "distance".to_string()
}

fn default_size_column() -> String {
    "size".to_string()
}

fn default_effort_column() -> String {
    "effort".to_string()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: default_date_column(),
            sample_label: default_sample_column(),
            replicate: default_replicate_column(),
            angle: default_angle_column(),
            radial_distance: default_distance_column(),
            size: default_size_column(),
            effort: default_effort_column(),
        }
    }
}

/// How the input file is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default)]
    pub angle_policy: AnglePolicy,

    #[serde(default)]
    pub columns: ColumnMapping,
}

fn default_delimiter() -> char {
    ','
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            angle_policy: AnglePolicy::default(),
            columns: ColumnMapping::default(),
        }
    }
}

/// Survey design constants attached during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    /// Repeated visits per transect; base effort is multiplied by this.
    #[serde(default = "default_visits")]
    pub visits: u32,

    #[serde(default = "default_region_label")]
    pub region_label: String,

    /// Stratum area in squared effort units.
    #[serde(default = "default_area")]
    pub area: f64,

    /// Multiplier taking distance units to effort units (m → km = 0.001).
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: f64,
}

fn default_visits() -> u32 {
    8
}

fn default_region_label() -> String {
    "GPNP".to_string()
}

fn default_area() -> f64 {
    10.8
}

fn default_conversion_factor() -> f64 {
    0.001
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            visits: default_visits(),
            region_label: default_region_label(),
            area: default_area(),
            conversion_factor: default_conversion_factor(),
        }
    }
}

/// Detection-function fitting and estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingConfig {
    #[serde(default = "default_keys")]
    pub keys: Vec<KeyFunction>,

    /// Largest number of cosine terms tried per key.
    #[serde(default = "default_max_adjustments")]
    pub max_adjustments: usize,

    /// Right truncation in distance units; `None` uses the largest distance.
    #[serde(default)]
    pub truncation: Option<f64>,

    /// Points per axis of the starting-value grid.
    #[serde(default = "default_grid_steps")]
    pub grid_steps: usize,

    #[serde(default = "default_max_iters")]
    pub max_iters: u64,

    /// Goodness-of-fit bins; `None` picks `√n` clamped to `[3, 20]`.
    #[serde(default)]
    pub gof_bins: Option<usize>,

    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

fn default_keys() -> Vec<KeyFunction> {
    vec![KeyFunction::HalfNormal, KeyFunction::HazardRate]
}

fn default_max_adjustments() -> usize {
    5
}

fn default_grid_steps() -> usize {
    12
}

fn default_max_iters() -> u64 {
    2_000
}

fn default_confidence_level() -> f64 {
    0.95
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            keys: default_keys(),
            max_adjustments: default_max_adjustments(),
            truncation: None,
            grid_steps: default_grid_steps(),
            max_iters: default_max_iters(),
            gof_bins: None,
            confidence_level: default_confidence_level(),
        }
    }
}

/// Full analysis configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub design: DesignConfig,

    #[serde(default)]
    pub fitting: FittingConfig,
}

impl SurveyConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SurveyConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.design;
        if d.visits == 0 {
            return Err(invalid("design.visits", "must be >= 1"));
        }
        if !(d.area.is_finite() && d.area > 0.0) {
            return Err(invalid("design.area", format!("must be finite and > 0 (got {})", d.area)));
        }
        if d.region_label.trim().is_empty() {
            return Err(invalid("design.region_label", "must not be empty"));
        }
        if !(d.conversion_factor.is_finite() && d.conversion_factor > 0.0) {
            return Err(invalid(
                "design.conversion_factor",
                format!("must be finite and > 0 (got {})", d.conversion_factor),
            ));
        }

        let f = &self.fitting;
        if f.keys.is_empty() {
            return Err(invalid("fitting.keys", "at least one key function is required"));
        }
        if let Some(w) = f.truncation {
            if !(w.is_finite() && w > 0.0) {
                return Err(invalid("fitting.truncation", format!("must be finite and > 0 (got {w})")));
            }
        }
        if f.grid_steps < 2 {
            return Err(invalid("fitting.grid_steps", "must be >= 2"));
        }
        if f.max_iters == 0 {
            return Err(invalid("fitting.max_iters", "must be >= 1"));
        }
        if !(f.confidence_level > 0.0 && f.confidence_level < 1.0) {
            return Err(invalid(
                "fitting.confidence_level",
                format!("must lie in (0, 1) (got {})", f.confidence_level),
            ));
        }
        if matches!(f.gof_bins, Some(b) if b < 2) {
            return Err(invalid("fitting.gof_bins", "must be >= 2"));
        }

        if !self.input.delimiter.is_ascii() {
            return Err(invalid("input.delimiter", "must be a single ASCII character"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
