//! Negative log-likelihood of perpendicular distances under a detection
//! function.
//!
//! For distances `x_1..x_n` within the truncation `w`:
//!
//! ```text
//! ln L = Σ ln g(x_i) − n ln μ,     μ = ∫₀ʷ g(x) dx
//! ```
//!
//! Parameter vectors that make `g` negative, non-finite or increasing anywhere
//! on `[0, w]` are infeasible and cost [`INFEASIBLE_COST`].

use argmin::core::{CostFunction, Error};

use crate::domain::KeyFunction;
use crate::models::{detection_probability, effective_strip_width};

/// Cost returned for infeasible parameters. Finite so the simplex can move
/// away from it.
pub const INFEASIBLE_COST: f64 = 1.0e100;

/// Points on `[0, w]` at which shape constraints are checked.
const SHAPE_GRID_POINTS: usize = 101;

/// Slack on the non-increasing check.
const MONOTONE_TOL: f64 = 1e-9;

/// The likelihood problem for one key and a fixed set of adjustment orders.
#[derive(Debug, Clone)]
pub struct DetectionLikelihood<'a> {
    pub key: KeyFunction,
    pub orders: &'a [u32],
    pub truncation: f64,
    pub distances: &'a [f64],
}

impl<'a> DetectionLikelihood<'a> {
    pub fn new(key: KeyFunction, orders: &'a [u32], truncation: f64, distances: &'a [f64]) -> Self {
        Self {
            key,
            orders,
            truncation,
            distances,
        }
    }

    /// Number of free parameters.
    pub fn dimension(&self) -> usize {
        self.key.key_param_len() + self.orders.len()
    }

    fn g(&self, params: &[f64], x: f64) -> f64 {
        detection_probability(self.key, self.orders, params, self.truncation, x)
    }

    /// `true` when `g` is finite, non-negative and non-increasing on `[0, w]`.
    pub fn is_feasible(&self, params: &[f64]) -> bool {
        let step = self.truncation / (SHAPE_GRID_POINTS - 1) as f64;
        let mut prev = f64::INFINITY;
        for i in 0..SHAPE_GRID_POINTS {
            let g = self.g(params, step * i as f64);
            if !g.is_finite() || g < 0.0 || g > prev + MONOTONE_TOL {
                return false;
            }
            prev = g;
        }
        true
    }

    /// `ln L`, or `None` for infeasible parameters.
    pub fn log_likelihood(&self, params: &[f64]) -> Option<f64> {
        if params.len() != self.dimension() || params.iter().any(|p| !p.is_finite()) {
            return None;
        }
        if !self.is_feasible(params) {
            return None;
        }
        let mu = effective_strip_width(self.key, self.orders, params, self.truncation);
        if !(mu.is_finite() && mu > 0.0) {
            return None;
        }

        let mut sum = 0.0;
        for &x in self.distances {
            let g = self.g(params, x);
            if !(g > 0.0) {
                return None;
            }
            sum += g.ln();
        }
        let ll = sum - self.distances.len() as f64 * mu.ln();
        ll.is_finite().then_some(ll)
    }

    /// `−ln L`, or [`INFEASIBLE_COST`].
    pub fn negative_log_likelihood(&self, params: &[f64]) -> f64 {
        self.log_likelihood(params).map_or(INFEASIBLE_COST, |ll| -ll)
    }
}

impl CostFunction for DetectionLikelihood<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.negative_log_likelihood(param))
    }
}

/// `AIC = 2k − 2 ln L`.
pub fn aic(log_likelihood: f64, k: usize) -> f64 {
    2.0 * k as f64 - 2.0 * log_likelihood
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_normal_likelihood_peaks_near_true_sigma() {
        // Distances spread evenly through the quantiles of a half-normal(σ=10).
        let distances: Vec<f64> = (1..=40)
            .map(|i| {
                let p = (i as f64 - 0.5) / 40.0;
                10.0 * std::f64::consts::SQRT_2 * inverse_erf(p)
            })
            .collect();
        let problem = DetectionLikelihood::new(KeyFunction::HalfNormal, &[], 60.0, &distances);

        let at_true = problem.log_likelihood(&[10.0_f64.ln()]).unwrap();
        let too_small = problem.log_likelihood(&[5.0_f64.ln()]).unwrap();
        let too_large = problem.log_likelihood(&[20.0_f64.ln()]).unwrap();
        assert!(at_true > too_small);
        assert!(at_true > too_large);
    }

    #[test]
    fn increasing_shapes_are_infeasible() {
        let distances = [1.0, 2.0, 3.0];
        let problem = DetectionLikelihood::new(KeyFunction::Uniform, &[1], 10.0, &distances);
        // a_1 < 0 makes 1 + a cos(πx/w) increase in x.
        assert!(!problem.is_feasible(&[-0.5]));
        assert!(problem.is_feasible(&[0.5]));
        assert_eq!(problem.negative_log_likelihood(&[-0.5]), INFEASIBLE_COST);
    }

    #[test]
    fn wrong_dimension_is_infeasible() {
        let problem = DetectionLikelihood::new(KeyFunction::HazardRate, &[], 10.0, &[1.0]);
        assert_eq!(problem.log_likelihood(&[1.0]), None);
    }

    #[test]
    fn aic_formula() {
        assert!((aic(-1079.96, 1) - 2161.92).abs() < 1e-9);
    }

    /// Bisection inverse of erf on [0, 1).
    fn inverse_erf(p: f64) -> f64 {
        let (mut lo, mut hi) = (0.0_f64, 6.0_f64);
        for _ in 0..100 {
            let mid = 0.5 * (lo + hi);
            if statrs::function::erf::erf(mid) < p {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}
