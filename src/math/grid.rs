//! Starting-value grids for the detection-function likelihood.
//!
//! Before running the simplex optimiser we evaluate the likelihood over a
//! deterministic grid of key parameters and start from the best point.
//! The hazard-rate likelihood is flat in places and has local optima.

use crate::domain::KeyFunction;
use crate::fit::FitError;

/// Scale grid spans `[w / SCALE_LO_DIV, w · SCALE_HI_MUL]`.
const SCALE_LO_DIV: f64 = 20.0;
const SCALE_HI_MUL: f64 = 2.0;

/// Hazard-rate shape grid spans `[1, SHAPE_HI]`.
const SHAPE_HI: f64 = 10.0;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(FitError::InvalidOptions(format!(
            "invalid grid range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(FitError::InvalidOptions("grid steps must be >= 2".to_string()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Candidate key-parameter tuples (on the log scale) for a key function.
///
/// - half-normal: `[ln σ]`
/// - hazard-rate: `[ln σ, ln b]` over the outer product of both axes
/// - uniform: a single empty tuple (no key parameters)
pub fn key_start_grid(key: KeyFunction, truncation: f64, steps: usize) -> Result<Vec<Vec<f64>>, FitError> {
    match key {
        KeyFunction::Uniform => Ok(vec![Vec::new()]),
        KeyFunction::HalfNormal => {
            let sigmas = log_space(truncation / SCALE_LO_DIV, truncation * SCALE_HI_MUL, steps)?;
            Ok(sigmas.into_iter().map(|s| vec![s.ln()]).collect())
        }
        KeyFunction::HazardRate => {
            let sigmas = log_space(truncation / SCALE_LO_DIV, truncation * SCALE_HI_MUL, steps)?;
            let shapes = log_space(1.0, SHAPE_HI, (steps / 2).max(2))?;
            let mut out = Vec::with_capacity(sigmas.len() * shapes.len());
            for &s in &sigmas {
                for &b in &shapes {
                    out.push(vec![s.ln(), b.ln()]);
                }
            }
            Ok(out)
        }
    }
}
