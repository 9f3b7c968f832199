//! Detection-function evaluation for the half-normal, hazard-rate and uniform
//! keys with cosine adjustment terms.
//!
//! ```text
//! g(x) = key(x) · (1 + Σ a_j cos(j π x / w))
//!        ─────────────────────────────────────
//!        key(0) · (1 + Σ a_j)
//! ```
//!
//! The denominator scales `g(0) = 1` (certain detection on the line). Every key
//! has `key(0) = 1`, so only the adjustment series needs rescaling.

use std::f64::consts::PI;

use crate::domain::{DetectionModel, KeyFunction};
use crate::math::{SIMPSON_PANELS, simpson};

/// Evaluate the key function at `x` given key parameters on the log scale.
pub fn key_value(key: KeyFunction, x: f64, key_params: &[f64]) -> f64 {
    match key {
        KeyFunction::HalfNormal => {
            let sigma = key_params[0].exp();
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        }
        KeyFunction::HazardRate => {
            let sigma = key_params[0].exp();
            let b = key_params[1].exp();
            if x <= 0.0 {
                return 1.0;
            }
            // (x/σ)^(-b) can overflow to +inf for tiny x; exp(-inf) = 0 gives 1.
            -(-(x / sigma).powf(-b)).exp_m1()
        }
        KeyFunction::Uniform => 1.0,
    }
}

/// `Σ a_j cos(j π x / w)` over the given orders.
pub fn cosine_series(orders: &[u32], coeffs: &[f64], x: f64, truncation: f64) -> f64 {
    orders
        .iter()
        .zip(coeffs)
        .map(|(&j, &a)| a * (j as f64 * PI * x / truncation).cos())
        .sum()
}

/// Detection probability `g(x)` with `g(0) = 1`.
///
/// Returns `NaN` when the adjustment series vanishes at zero (the model is not
/// scalable); callers treat non-finite values as infeasible.
pub fn detection_probability(
    key: KeyFunction,
    orders: &[u32],
    params: &[f64],
    truncation: f64,
    x: f64,
) -> f64 {
    let (key_params, coeffs) = params.split_at(key.key_param_len());
    let at_zero = 1.0 + coeffs.iter().sum::<f64>();
    if at_zero.abs() < 1e-12 {
        return f64::NAN;
    }
    let series = 1.0 + cosine_series(orders, coeffs, x, truncation);
    key_value(key, x, key_params) * series / at_zero
}

/// `g(x)` for a fitted model.
pub fn predict(model: &DetectionModel, x: f64) -> f64 {
    detection_probability(model.key, &model.adjustment_orders, &model.params, model.truncation, x)
}

/// `μ = ∫₀ʷ g(x) dx`, the effective strip half-width.
pub fn effective_strip_width(key: KeyFunction, orders: &[u32], params: &[f64], truncation: f64) -> f64 {
    simpson(
        |x| detection_probability(key, orders, params, truncation, x),
        0.0,
        truncation,
        SIMPSON_PANELS,
    )
}

/// `∫ₐᵇ g(x) dx` for a fitted model (used by goodness-of-fit binning).
pub fn integrate_between(model: &DetectionModel, a: f64, b: f64) -> f64 {
    let panels = (SIMPSON_PANELS as f64 * (b - a) / model.truncation).ceil() as usize;
    simpson(|x| predict(model, x), a, b, panels.max(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_is_one_on_the_line() {
        let hn = [30.0_f64.ln()];
        let hr = [30.0_f64.ln(), 3.0_f64.ln()];
        assert!((detection_probability(KeyFunction::HalfNormal, &[], &hn, 100.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((detection_probability(KeyFunction::HazardRate, &[], &hr, 100.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((detection_probability(KeyFunction::Uniform, &[1], &[0.4], 100.0, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn adjusted_models_are_rescaled_at_zero() {
        let params = [20.0_f64.ln(), 0.3, -0.1];
        let g0 = detection_probability(KeyFunction::HalfNormal, &[2, 3], &params, 60.0, 0.0);
        assert!((g0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn half_normal_esw_matches_closed_form() {
        let sigma: f64 = 20.0;
        let w = 200.0;
        let esw = effective_strip_width(KeyFunction::HalfNormal, &[], &[sigma.ln()], w);
        let exact = sigma * (PI / 2.0).sqrt();
        assert!((esw - exact).abs() < 1e-6, "esw={esw} exact={exact}");
    }

    #[test]
    fn hazard_rate_is_decreasing() {
        let params = [25.0_f64.ln(), 2.5_f64.ln()];
        let mut prev = 1.0;
        for i in 1..=100 {
            let g = detection_probability(KeyFunction::HazardRate, &[], &params, 100.0, i as f64);
            assert!(g <= prev + 1e-12);
            assert!(g >= 0.0);
            prev = g;
        }
    }

    #[test]
    fn uniform_without_adjustments_is_flat() {
        let esw = effective_strip_width(KeyFunction::Uniform, &[], &[], 50.0);
        assert!((esw - 50.0).abs() < 1e-9);
    }
}
