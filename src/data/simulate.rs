//! Synthetic line-transect surveys in the input file format.
//!
//! Each transect is walked `visits` times. Per visit the number of detected
//! clusters is Poisson; perpendicular distances are half-normal truncated at
//! `truncation`; the recorded (angle, radial distance) pair projects back onto
//! that perpendicular distance. A visit with no detections is written as an
//! effort-only row.

use std::io::{Cursor, Write};

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::config::{DesignConfig, InputConfig};
use crate::error::AppError;
use crate::io::read_survey;
use crate::schema::{DistanceTable, normalize};

/// Largest simulated sighting angle; keeps radial distances bounded.
const MAX_SIM_ANGLE_DEG: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub transects: usize,
    /// Base transect length in effort units.
    pub transect_length: f64,
    pub visits: u32,
    /// Mean detected clusters per transect visit.
    pub mean_detections: f64,
    /// Half-normal scale in distance units.
    pub sigma: f64,
    pub truncation: f64,
    /// Mean cluster size (≥ 1); sizes are `1 + Poisson(mean − 1)`.
    pub mean_cluster_size: f64,
    pub start_date: NaiveDate,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            transects: 20,
            transect_length: 5.0,
            visits: 8,
            mean_detections: 1.5,
            sigma: 25.0,
            truncation: 100.0,
            mean_cluster_size: 1.5,
            start_date: NaiveDate::from_ymd_opt(2019, 3, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

/// One simulated input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedRow {
    pub date: NaiveDate,
    pub transect: String,
    pub replicate: u32,
    pub angle: Option<f64>,
    pub distance: Option<f64>,
    pub size: Option<u32>,
    pub effort: f64,
}

fn validate(config: &SimulationConfig) -> Result<(), AppError> {
    if config.transects == 0 {
        return Err(AppError::new(2, "Simulation needs at least one transect."));
    }
    if config.visits == 0 {
        return Err(AppError::new(2, "Simulation needs at least one visit."));
    }
    if !(config.transect_length.is_finite() && config.transect_length > 0.0) {
        return Err(AppError::new(2, "Transect length must be finite and > 0."));
    }
    if !(config.mean_detections.is_finite() && config.mean_detections >= 0.0) {
        return Err(AppError::new(2, "Mean detections must be finite and >= 0."));
    }
    if !(config.sigma.is_finite() && config.sigma > 0.0) {
        return Err(AppError::new(2, "Half-normal sigma must be finite and > 0."));
    }
    if !(config.truncation.is_finite() && config.truncation > 0.0) {
        return Err(AppError::new(2, "Truncation must be finite and > 0."));
    }
    if !(config.mean_cluster_size.is_finite() && config.mean_cluster_size >= 1.0) {
        return Err(AppError::new(2, "Mean cluster size must be finite and >= 1."));
    }
    Ok(())
}

/// Generate the rows of a synthetic survey. Identical configs give identical
/// rows.
pub fn simulate(config: &SimulationConfig) -> Result<Vec<SimulatedRow>, AppError> {
    validate(config)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal =
        Normal::new(0.0, config.sigma).map_err(|e| AppError::new(4, format!("Distance distribution error: {e}")))?;
    let detections = poisson(config.mean_detections)?;
    let extra_size = poisson(config.mean_cluster_size - 1.0)?;

    let mut rows = Vec::new();
    for t in 0..config.transects {
        let transect = format!("T{:02}", t + 1);
        for visit in 1..=config.visits {
            let date = config.start_date + Duration::days(7 * i64::from(visit - 1));
            let count = detections.as_ref().map_or(0, |d| d.sample(&mut rng) as usize);

            if count == 0 {
                rows.push(SimulatedRow {
                    date,
                    transect: transect.clone(),
                    replicate: visit,
                    angle: None,
                    distance: None,
                    size: None,
                    effort: config.transect_length,
                });
                continue;
            }

            for _ in 0..count {
                let x = loop {
                    let x: f64 = normal.sample(&mut rng);
                    let x = x.abs();
                    if x <= config.truncation {
                        break x;
                    }
                };
                let angle = rng.gen_range(0.0..MAX_SIM_ANGLE_DEG);
                let radial = x / angle.to_radians().cos();
                let size = 1 + extra_size.as_ref().map_or(0, |d| d.sample(&mut rng) as u32);
                rows.push(SimulatedRow {
                    date,
                    transect: transect.clone(),
                    replicate: visit,
                    angle: Some(angle),
                    distance: Some(radial),
                    size: Some(size),
                    effort: config.transect_length,
                });
            }
        }
    }

    log::info!(
        "simulated {} rows over {} transects × {} visits",
        rows.len(),
        config.transects,
        config.visits
    );
    Ok(rows)
}

/// `None` for a zero mean (no draws needed).
fn poisson(mean: f64) -> Result<Option<Poisson<f64>>, AppError> {
    if mean <= 0.0 {
        return Ok(None);
    }
    Poisson::new(mean)
        .map(Some)
        .map_err(|e| AppError::new(4, format!("Poisson distribution error: {e}")))
}

/// Write rows with the default input header
/// (`date,transect,replicate,angle,distance,size,effort`).
pub fn write_simulation<W: Write>(rows: &[SimulatedRow], writer: W) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["date", "transect", "replicate", "angle", "distance", "size", "effort"])
        .map_err(|e| AppError::new(2, format!("Failed to write simulation header: {e}")))?;
    for row in rows {
        let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
        wtr.write_record([
            row.date.to_string(),
            row.transect.clone(),
            row.replicate.to_string(),
            opt(row.angle),
            opt(row.distance),
            row.size.map(|s| s.to_string()).unwrap_or_default(),
            row.effort.to_string(),
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write simulation row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush simulation output: {e}")))?;
    Ok(())
}

/// Simulate, then run the rows through the loader and normalizer.
pub fn simulated_table(config: &SimulationConfig) -> Result<DistanceTable, AppError> {
    let rows = simulate(config)?;
    let mut buf = Vec::new();
    write_simulation(&rows, &mut buf)?;

    let input = InputConfig::default();
    let mut survey = read_survey(Cursor::new(buf), &input)?;
    survey.derive_distances(input.angle_policy);
    let design = DesignConfig {
        visits: config.visits,
        ..DesignConfig::default()
    };
    Ok(normalize(&survey, &design)?)
}
