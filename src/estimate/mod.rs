//! Density and abundance for a fitted detection function.
//!
//! Conventional line-transect estimator over one stratum:
//!
//! ```text
//! D̂ = (n / L) · Ê[s] / (2 μ̂ c)        N̂ = D̂ · A
//! cv²(D̂) = cv²(n/L) + cv²(μ̂) + cv²(Ê[s])
//! ```
//!
//! `c` converts distance units to effort units. Encounter-rate variance uses
//! the Fewster et al. (2009) R2 estimator; degrees of freedom come from the
//! Satterthwaite approximation and intervals are log-normal.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::fit::{FitError, FitOptions, FittedModel};
use crate::schema::DistanceTable;

/// Detections and effort on one transect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransectSummary {
    pub label: String,
    pub effort: f64,
    /// Detections within the truncation distance.
    pub detections: usize,
    pub individuals: u64,
}

/// The survey quantities estimation needs, captured at fit time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveySummary {
    pub region_label: String,
    pub area: f64,
    pub truncation: f64,
    pub transects: Vec<TransectSummary>,
    pub cluster_sizes: Vec<u32>,
    /// Detections beyond the truncation distance.
    pub truncated: usize,
    pub conversion_factor: f64,
    pub confidence_level: f64,
}

impl SurveySummary {
    pub fn from_table(table: &DistanceTable, truncation: f64, options: &FitOptions) -> Self {
        let mut transects: Vec<TransectSummary> = table
            .transects()
            .into_iter()
            .map(|t| TransectSummary {
                label: t.label,
                effort: t.effort,
                detections: 0,
                individuals: 0,
            })
            .collect();

        let mut cluster_sizes = Vec::new();
        let mut truncated = 0;
        for (label, distance, size) in table.detections() {
            if distance > truncation {
                truncated += 1;
                continue;
            }
            cluster_sizes.push(size);
            if let Some(t) = transects.iter_mut().find(|t| t.label == label) {
                t.detections += 1;
                t.individuals += u64::from(size);
            }
        }

        Self {
            region_label: table.stratum().label.clone(),
            area: table.stratum().area,
            truncation,
            transects,
            cluster_sizes,
            truncated,
            conversion_factor: options.conversion_factor,
            confidence_level: options.confidence_level,
        }
    }

    pub fn detections(&self) -> usize {
        self.cluster_sizes.len()
    }

    pub fn total_effort(&self) -> f64 {
        self.transects.iter().map(|t| t.effort).sum()
    }
}

/// A point estimate with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub value: f64,
    pub se: f64,
    pub cv: f64,
    pub lcl: f64,
    pub ucl: f64,
    /// Degrees of freedom behind the interval; `None` means a normal quantile.
    pub df: Option<f64>,
}

impl Estimate {
    fn from_cv(value: f64, cv: f64, df: Option<f64>, level: f64) -> Self {
        let (lcl, ucl) = log_normal_interval(value, cv, df, level);
        Self {
            value,
            se: value * cv,
            cv,
            lcl,
            ucl,
            df,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityEstimate {
    pub density: Estimate,
    pub abundance: Estimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimates {
    pub region_label: String,
    pub area: f64,
    pub detections: usize,
    pub transects: usize,
    pub effort: f64,
    pub confidence_level: f64,
    pub encounter_rate: Estimate,
    pub esw: Estimate,
    pub p_a: Estimate,
    pub mean_cluster_size: Estimate,
    pub individuals: DensityEstimate,
    pub clusters: DensityEstimate,
}

/// A variance component: its squared cv and degrees of freedom.
#[derive(Debug, Clone, Copy)]
struct Component {
    cv2: f64,
    df: f64,
}

/// Estimate density and abundance for `fit`.
pub fn estimate(fit: &FittedModel) -> Result<Estimates, FitError> {
    let survey = &fit.survey;
    let level = survey.confidence_level;
    let n = survey.detections();
    let k = survey.transects.len();
    let effort = survey.total_effort();

    if n == 0 {
        return Err(FitError::Variance("no detections within truncation".to_string()));
    }
    if !(effort > 0.0) {
        return Err(FitError::Variance("total effort must be > 0".to_string()));
    }

    // Encounter rate.
    let er = n as f64 / effort;
    let er_var = encounter_rate_variance(&survey.transects)?;
    let er_part = Component {
        cv2: er_var / (er * er),
        df: (k - 1) as f64,
    };

    // Effective strip width.
    let esw_se = fit
        .esw_se
        .ok_or_else(|| FitError::Variance(format!("{}: no parameter covariance", fit.model.label())))?;
    let esw_cv = esw_se / fit.esw;
    let esw_part = Component {
        cv2: esw_cv * esw_cv,
        df: n.saturating_sub(fit.model.param_count()).max(1) as f64,
    };

    // Mean cluster size.
    let sizes: Vec<f64> = survey.cluster_sizes.iter().map(|&s| f64::from(s)).collect();
    let mean_size = sizes.iter().sum::<f64>() / n as f64;
    let size_var = if n > 1 {
        sizes.iter().map(|s| (s - mean_size).powi(2)).sum::<f64>() / (n - 1) as f64 / n as f64
    } else {
        0.0
    };
    let size_part = Component {
        cv2: size_var / (mean_size * mean_size),
        df: (n.max(2) - 1) as f64,
    };

    let c = survey.conversion_factor;
    let cluster_density = er / (2.0 * fit.esw * c);
    let individual_density = cluster_density * mean_size;

    let cluster_parts = [er_part, esw_part];
    let individual_parts = [er_part, esw_part, size_part];

    let density_estimate = |value: f64, parts: &[Component]| -> DensityEstimate {
        let cv = parts.iter().map(|p| p.cv2).sum::<f64>().sqrt();
        let df = satterthwaite_df(parts);
        DensityEstimate {
            density: Estimate::from_cv(value, cv, df, level),
            abundance: Estimate::from_cv(value * survey.area, cv, df, level),
        }
    };

    let individuals = density_estimate(individual_density, &individual_parts);
    let clusters = density_estimate(cluster_density, &cluster_parts);

    log::info!(
        "D̂={:.4} (cv {:.3}), N̂={:.1} in {} ({} detections, {} transects)",
        individuals.density.value,
        individuals.density.cv,
        individuals.abundance.value,
        survey.region_label,
        n,
        k
    );

    Ok(Estimates {
        region_label: survey.region_label.clone(),
        area: survey.area,
        detections: n,
        transects: k,
        effort,
        confidence_level: level,
        encounter_rate: Estimate::from_cv(er, er_part.cv2.sqrt(), Some(er_part.df), level),
        esw: Estimate::from_cv(fit.esw, esw_cv, Some(esw_part.df), level),
        p_a: Estimate::from_cv(fit.p_a, esw_cv, Some(esw_part.df), level),
        mean_cluster_size: Estimate::from_cv(mean_size, size_part.cv2.sqrt(), Some(size_part.df), level),
        individuals,
        clusters,
    })
}

/// Fewster R2 encounter-rate variance:
/// `K / (L² (K−1)) · Σ l_k² (n_k/l_k − n/L)²`.
pub fn encounter_rate_variance(transects: &[TransectSummary]) -> Result<f64, FitError> {
    let k = transects.len();
    if k < 2 {
        return Err(FitError::Variance(format!(
            "encounter-rate variance needs at least 2 transects (got {k})"
        )));
    }
    let effort: f64 = transects.iter().map(|t| t.effort).sum();
    let n: usize = transects.iter().map(|t| t.detections).sum();
    let er = n as f64 / effort;

    let sum: f64 = transects
        .iter()
        .map(|t| {
            let diff = t.detections as f64 / t.effort - er;
            t.effort * t.effort * diff * diff
        })
        .sum();
    Ok(k as f64 / (effort * effort * (k - 1) as f64) * sum)
}

/// Satterthwaite degrees of freedom for a sum of squared cvs.
///
/// Components with zero variance contribute nothing; `None` when every
/// component is zero.
fn satterthwaite_df(parts: &[Component]) -> Option<f64> {
    let total: f64 = parts.iter().map(|p| p.cv2).sum();
    let denom: f64 = parts
        .iter()
        .filter(|p| p.cv2 > 0.0 && p.df > 0.0)
        .map(|p| p.cv2 * p.cv2 / p.df)
        .sum();
    (denom > 0.0).then(|| total * total / denom)
}

/// Two-sided quantile for `level` under Student's t (or normal when `df` is
/// unknown or not usable).
fn quantile(df: Option<f64>, level: f64) -> f64 {
    let p = 0.5 + level / 2.0;
    if let Some(t) = df.filter(|d| d.is_finite() && *d > 0.0).and_then(|d| StudentsT::new(0.0, 1.0, d).ok()) {
        return t.inverse_cdf(p);
    }
    Normal::new(0.0, 1.0).map_or(1.959_963_984_540_054, |z| z.inverse_cdf(p))
}

/// Log-normal interval `(v / C, v · C)`, `C = exp(q · √ln(1 + cv²))`.
pub fn log_normal_interval(value: f64, cv: f64, df: Option<f64>, level: f64) -> (f64, f64) {
    if !(cv > 0.0) || !(value > 0.0) {
        return (value, value);
    }
    let c = (quantile(df, level) * (1.0 + cv * cv).ln().sqrt()).exp();
    (value / c, value * c)
}
