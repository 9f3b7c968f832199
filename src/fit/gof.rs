//! Binned chi-square goodness of fit.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::domain::DetectionModel;
use crate::models::integrate_between;

const MIN_BINS: usize = 3;
const MAX_BINS: usize = 20;

/// One distance interval of the goodness-of-fit table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GofBin {
    pub lower: f64,
    pub upper: f64,
    pub observed: usize,
    pub expected: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoodnessOfFit {
    pub bins: Vec<GofBin>,
    pub chi_square: f64,
    pub df: usize,
    /// `None` when there are too few bins for the parameter count.
    pub p_value: Option<f64>,
}

/// Default bin count: `√n` clamped to `[3, 20]`.
pub fn default_bin_count(n: usize) -> usize {
    ((n as f64).sqrt().round() as usize).clamp(MIN_BINS, MAX_BINS)
}

/// Chi-square test of observed distances against `g(x)/μ` on equal-width bins.
pub fn chi_square_gof(model: &DetectionModel, esw: f64, distances: &[f64], bins: Option<usize>) -> GoodnessOfFit {
    let n = distances.len();
    let n_bins = bins.unwrap_or_else(|| default_bin_count(n)).max(2);
    let w = model.truncation;
    let width = w / n_bins as f64;

    let mut observed = vec![0usize; n_bins];
    for &x in distances {
        let idx = ((x / width) as usize).min(n_bins - 1);
        observed[idx] += 1;
    }

    let mut chi_square = 0.0;
    let mut out = Vec::with_capacity(n_bins);
    for (j, &obs) in observed.iter().enumerate() {
        let lower = width * j as f64;
        let upper = if j + 1 == n_bins { w } else { width * (j + 1) as f64 };
        let expected = n as f64 * integrate_between(model, lower, upper) / esw;
        if expected > 0.0 {
            let diff = obs as f64 - expected;
            chi_square += diff * diff / expected;
        }
        out.push(GofBin {
            lower,
            upper,
            observed: obs,
            expected,
        });
    }

    let df = n_bins.saturating_sub(1 + model.param_count());
    let p_value = if df >= 1 {
        ChiSquared::new(df as f64).ok().map(|dist| 1.0 - dist.cdf(chi_square))
    } else {
        None
    };

    GoodnessOfFit {
        bins: out,
        chi_square,
        df,
        p_value,
    }
}
