//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory while the survey table is prepared and fitted
//! - exported to CSV/JSON
//! - rendered in terminal reports

use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::math::perpendicular_distance;

/// Canonical column names expected by detection-function fitting.
///
/// These are bit-exact: downstream tooling (and the exported table) relies on
/// the dotted spelling.
pub mod columns {
    pub const DISTANCE: &str = "distance";
    pub const SAMPLE_LABEL: &str = "Sample.Label";
    pub const EFFORT: &str = "Effort";
    pub const REGION_LABEL: &str = "Region.Label";
    pub const AREA: &str = "Area";
    pub const SIZE: &str = "size";

    /// Retained (non-canonical) columns carried alongside the canonical ones.
    pub const DATE: &str = "date";
    pub const REPLICATE: &str = "replicate";
    pub const ANGLE: &str = "angle";
    pub const RADIAL_DISTANCE: &str = "radial_distance";

    pub const CANONICAL: [&str; 6] = [DISTANCE, SAMPLE_LABEL, EFFORT, REGION_LABEL, AREA, SIZE];
    pub const RETAINED: [&str; 4] = [DATE, REPLICATE, ANGLE, RADIAL_DISTANCE];
}

/// Parametric family describing detection probability as a function of distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFunction {
    /// `exp(-x² / 2σ²)`
    HalfNormal,
    /// `1 - exp(-(x/σ)^(-b))`
    HazardRate,
    /// Flat key; only meaningful with at least one adjustment term.
    Uniform,
}

impl KeyFunction {
    pub const ALL: [KeyFunction; 3] = [KeyFunction::HalfNormal, KeyFunction::HazardRate, KeyFunction::Uniform];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            KeyFunction::HalfNormal => "Half-normal",
            KeyFunction::HazardRate => "Hazard-rate",
            KeyFunction::Uniform => "Uniform",
        }
    }

    /// Number of key parameters (scale, shape), excluding adjustment terms.
    pub fn key_param_len(self) -> usize {
        match self {
            KeyFunction::HalfNormal => 1,
            KeyFunction::HazardRate => 2,
            KeyFunction::Uniform => 0,
        }
    }

    /// Order of the first cosine adjustment term.
    ///
    /// The first cosine term is confounded with the scale parameter of the
    /// half-normal and hazard-rate keys, so those start at order 2.
    pub fn first_adjustment_order(self) -> u32 {
        match self {
            KeyFunction::HalfNormal | KeyFunction::HazardRate => 2,
            KeyFunction::Uniform => 1,
        }
    }

    /// Smallest number of adjustment terms that gives an identifiable model.
    pub fn min_adjustments(self) -> usize {
        match self {
            KeyFunction::Uniform => 1,
            _ => 0,
        }
    }
}

/// What to do with an angle outside `[0°, 90°]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnglePolicy {
    /// Drop the row and report it as a row error.
    #[default]
    Reject,
    /// Clamp into `[0°, 90°]` and keep the row (logged as a warning).
    Clamp,
}

/// A detection on one survey row, before and after the geometry transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub angle_deg: f64,
    pub radial_distance: f64,
    pub size: u32,
    /// Set by [`SurveyData::derive_distances`].
    pub angle_rad: Option<f64>,
    /// Set by [`SurveyData::derive_distances`].
    pub distance: Option<f64>,
}

/// One row of the loaded survey file.
///
/// Rows without a sighting are effort-only rows: the transect was walked on
/// that occasion but nothing was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// 1-based line in the source file (header is line 1).
    pub line: usize,
    pub date: Option<NaiveDate>,
    pub sample_label: String,
    pub replicate: Option<u32>,
    pub sighting: Option<Sighting>,
    /// Base transect length for a single visit.
    pub base_effort: f64,
    /// Unmapped input columns, keyed by their (normalized) header name.
    pub extras: BTreeMap<String, String>,
}

/// A row-level problem encountered while loading or transforming.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub sample: Option<String>,
    pub message: String,
}

/// The survey file as loaded, prior to canonical renaming.
#[derive(Debug, Clone, Default)]
pub struct SurveyData {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    /// Names of input columns not covered by the column mapping.
    pub extra_columns: Vec<String>,
    pub rows_read: usize,
}

impl SurveyData {
    /// Convert every sighting's angle to radians and derive its perpendicular
    /// distance in place.
    ///
    /// A sighting whose geometry is invalid under `policy` is dropped and
    /// reported in `row_errors`; its row stays as an effort-only row because the
    /// transect was still walked. Returns the number of sightings dropped.
    pub fn derive_distances(&mut self, policy: AnglePolicy) -> usize {
        let mut rejected = 0;
        for obs in &mut self.observations {
            let Some(sighting) = obs.sighting.as_mut() else {
                continue;
            };
            match perpendicular_distance(sighting.radial_distance, sighting.angle_deg, policy) {
                Ok(projection) => {
                    if projection.clamped {
                        log::warn!(
                            "line {}: angle {}° clamped to {}°",
                            obs.line,
                            sighting.angle_deg,
                            projection.angle_deg
                        );
                    }
                    sighting.angle_rad = Some(projection.angle_rad);
                    sighting.distance = Some(projection.distance);
                }
                Err(err) => {
                    self.row_errors.push(RowError {
                        line: obs.line,
                        sample: Some(obs.sample_label.clone()),
                        message: format!("{err}; sighting dropped, effort kept"),
                    });
                    obs.sighting = None;
                    rejected += 1;
                }
            }
        }
        rejected
    }

    /// Number of rows carrying a sighting.
    pub fn detection_count(&self) -> usize {
        self.observations.iter().filter(|o| o.sighting.is_some()).count()
    }

    /// Range of derived perpendicular distances, if any were derived.
    pub fn distance_range(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for d in self
            .observations
            .iter()
            .filter_map(|o| o.sighting.as_ref().and_then(|s| s.distance))
        {
            lo = lo.min(d);
            hi = hi.max(d);
        }
        (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
    }
}

/// Geographic stratum (region) with its area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stratum {
    pub label: String,
    pub area: f64,
}

/// A surveyed transect and its cumulative effort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transect {
    pub label: String,
    pub effort: f64,
}

/// Detection-function parameters for one candidate.
///
/// Parameter layout: key parameters first (`ln σ`, then `ln b` for the
/// hazard-rate), followed by one coefficient per cosine adjustment order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionModel {
    pub key: KeyFunction,
    pub adjustment_orders: Vec<u32>,
    pub params: Vec<f64>,
    /// Right-truncation distance `w` (distance units of the input).
    pub truncation: f64,
}

impl DetectionModel {
    pub fn new(key: KeyFunction, adjustment_orders: Vec<u32>, params: Vec<f64>, truncation: f64) -> Self {
        Self {
            key,
            adjustment_orders,
            params,
            truncation,
        }
    }

    /// `(key parameters, adjustment coefficients)`.
    pub fn split_params(&self) -> (&[f64], &[f64]) {
        self.params.split_at(self.key.key_param_len().min(self.params.len()))
    }

    pub fn adjustment_count(&self) -> usize {
        self.adjustment_orders.len()
    }

    /// Parameter count used by information criteria.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// `"Half-normal + cos(2,3)"`.
    pub fn label(&self) -> String {
        if self.adjustment_orders.is_empty() {
            return self.key.display_name().to_string();
        }
        let orders: Vec<String> = self.adjustment_orders.iter().map(u32::to_string).collect();
        format!("{} + cos({})", self.key.display_name(), orders.join(","))
    }

    /// Scale parameter σ on the natural scale (if the key has one).
    pub fn scale(&self) -> Option<f64> {
        match self.key {
            KeyFunction::HalfNormal | KeyFunction::HazardRate => self.params.first().map(|v| v.exp()),
            KeyFunction::Uniform => None,
        }
    }

    /// Shape parameter b on the natural scale (hazard-rate only).
    pub fn shape(&self) -> Option<f64> {
        match self.key {
            KeyFunction::HazardRate => self.params.get(1).map(|v| v.exp()),
            _ => None,
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    pub k: usize,
    pub log_likelihood: f64,
    pub aic: f64,
}

/// Convenience for building a sighting that has not been transformed yet.
impl Sighting {
    pub fn raw(angle_deg: f64, radial_distance: f64, size: u32) -> Self {
        Self {
            angle_deg,
            radial_distance,
            size,
            angle_rad: None,
            distance: None,
        }
    }
}
