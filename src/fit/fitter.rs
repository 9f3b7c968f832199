//! Maximum-likelihood fit of a single key function.
//!
//! Given:
//! - perpendicular distances `x_i ≤ w`
//! - a key function (half-normal, hazard-rate, uniform)
//!
//! we:
//! - pick starting key parameters from a deterministic grid
//! - minimise `−ln L` with Nelder–Mead
//! - add cosine adjustment terms one at a time while AIC improves
//! - compute the parameter covariance, ESW standard error and goodness of fit
//!   for the chosen term count

use argmin::core::{Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use finitediff::FiniteDiff;
use nalgebra::DMatrix;

use crate::config::SurveyConfig;
use crate::domain::{DetectionModel, FitQuality, KeyFunction};
use crate::estimate::{Estimates, SurveySummary, estimate};
use crate::fit::FitError;
use crate::fit::gof::{GoodnessOfFit, chi_square_gof};
use crate::fit::likelihood::{DetectionLikelihood, INFEASIBLE_COST, aic};
use crate::math::key_start_grid;
use crate::models::effective_strip_width;
use crate::schema::DistanceTable;

/// Minimum number of detections beyond the parameter count.
const MIN_N_BUFFER: usize = 5;

/// Simplex edge lengths for key parameters (log scale) and cosine coefficients.
const KEY_STEP: f64 = 0.25;
const ADJUSTMENT_STEP: f64 = 0.1;

/// Stop when the simplex's cost standard deviation falls below this.
const SD_TOLERANCE: f64 = 1e-10;

/// Outer step for the Hessian (differences of finite-difference gradients).
const HESSIAN_STEP: f64 = 1e-4;

/// Options that affect how each key function is fitted and estimated.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Right truncation; `None` uses the largest observed distance.
    pub truncation: Option<f64>,
    pub max_adjustments: usize,
    pub grid_steps: usize,
    pub max_iters: u64,
    pub gof_bins: Option<usize>,
    /// Distance units → effort units.
    pub conversion_factor: f64,
    pub confidence_level: f64,
}

impl FitOptions {
    pub fn from_config(config: &SurveyConfig) -> Self {
        let f = &config.fitting;
        Self {
            truncation: f.truncation,
            max_adjustments: f.max_adjustments,
            grid_steps: f.grid_steps,
            max_iters: f.max_iters,
            gof_bins: f.gof_bins,
            conversion_factor: config.design.conversion_factor,
            confidence_level: f.confidence_level,
        }
    }

    pub fn validate(&self) -> Result<(), FitError> {
        if let Some(w) = self.truncation {
            if !(w.is_finite() && w > 0.0) {
                return Err(FitError::InvalidOptions(format!("truncation must be finite and > 0 (got {w})")));
            }
        }
        if self.grid_steps < 2 {
            return Err(FitError::InvalidOptions("grid steps must be >= 2".to_string()));
        }
        if self.max_iters == 0 {
            return Err(FitError::InvalidOptions("max iterations must be >= 1".to_string()));
        }
        if !(self.conversion_factor.is_finite() && self.conversion_factor > 0.0) {
            return Err(FitError::InvalidOptions(format!(
                "conversion factor must be finite and > 0 (got {})",
                self.conversion_factor
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(FitError::InvalidOptions(format!(
                "confidence level must lie in (0, 1) (got {})",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self::from_config(&SurveyConfig::default())
    }
}

/// Fits a detection function of a given key to a distance table.
pub trait DetectionFitter {
    fn fit(&self, table: &DistanceTable, key: KeyFunction, options: &FitOptions) -> Result<FittedModel, FitError>;
}

/// A fitted detection function plus everything needed to estimate density.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub model: DetectionModel,
    pub quality: FitQuality,
    /// Effective strip half-width `μ`.
    pub esw: f64,
    /// Average detection probability within the strip, `μ / w`.
    pub p_a: f64,
    /// Covariance of the (log-scale) parameters; `None` if the Hessian was not
    /// invertible.
    pub covariance: Option<DMatrix<f64>>,
    pub esw_se: Option<f64>,
    pub gof: GoodnessOfFit,
    pub survey: SurveySummary,
    pub iterations: u64,
}

impl FittedModel {
    pub fn aic(&self) -> f64 {
        self.quality.aic
    }

    /// Density and abundance under this detection function.
    pub fn estimate(&self) -> Result<Estimates, FitError> {
        estimate(self)
    }

    pub fn p_a_se(&self) -> Option<f64> {
        self.esw_se.map(|se| se / self.model.truncation)
    }
}

/// Maximum likelihood with grid starts, Nelder–Mead and stepwise cosine terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumLikelihoodFitter;

impl DetectionFitter for MaximumLikelihoodFitter {
    fn fit(&self, table: &DistanceTable, key: KeyFunction, options: &FitOptions) -> Result<FittedModel, FitError> {
        options.validate()?;

        let truncation = match options.truncation {
            Some(w) => w,
            None => table.max_distance().ok_or(FitError::InsufficientData {
                key,
                n: 0,
                needed: key.key_param_len() + key.min_adjustments() + MIN_N_BUFFER,
            })?,
        };
        if !(truncation > 0.0) {
            return Err(FitError::InsufficientData {
                key,
                n: 0,
                needed: key.key_param_len() + key.min_adjustments() + MIN_N_BUFFER,
            });
        }

        let distances: Vec<f64> = table
            .detections()
            .map(|(_, d, _)| d)
            .filter(|&d| d <= truncation)
            .collect();
        let n = distances.len();

        let base_orders = adjustment_orders(key, key.min_adjustments());
        let needed = key.key_param_len() + base_orders.len() + MIN_N_BUFFER;
        if n < needed {
            return Err(FitError::InsufficientData { key, n, needed });
        }

        let grid = key_start_grid(key, truncation, options.grid_steps)?;
        let mut best = fit_with_orders(key, &base_orders, truncation, &distances, &grid, options)?;
        log::debug!(
            "{}: {} adjustment(s), lnL={:.4}, AIC={:.4}",
            key.display_name(),
            base_orders.len(),
            best.log_likelihood,
            best.aic
        );
        let mut covariance = {
            let problem = DetectionLikelihood::new(key, &best.orders, truncation, &distances);
            match parameter_covariance(&problem, &best.params) {
                Ok(c) => Some(c),
                Err(err) => {
                    log::warn!("{}: {err}", key.display_name());
                    None
                }
            }
        };

        // A term is kept only if it lowers AIC and leaves an invertible Hessian.
        let max_terms = options.max_adjustments.max(key.min_adjustments());
        while best.orders.len() < max_terms {
            let orders = adjustment_orders(key, best.orders.len() + 1);
            if n < key.key_param_len() + orders.len() + MIN_N_BUFFER {
                break;
            }
            let mut start = best.params.clone();
            start.push(0.0);
            let trial = match fit_with_orders(key, &orders, truncation, &distances, &[start], options) {
                Ok(t) => t,
                Err(err) => {
                    log::debug!("{}: stopping at {} adjustment(s): {err}", key.display_name(), best.orders.len());
                    break;
                }
            };
            log::debug!(
                "{}: {} adjustment(s), lnL={:.4}, AIC={:.4}",
                key.display_name(),
                orders.len(),
                trial.log_likelihood,
                trial.aic
            );
            if trial.aic >= best.aic {
                break;
            }
            let problem = DetectionLikelihood::new(key, &trial.orders, truncation, &distances);
            match parameter_covariance(&problem, &trial.params) {
                Ok(c) => {
                    covariance = Some(c);
                    best = trial;
                }
                Err(err) => {
                    log::debug!("{}: rejecting {} adjustment(s): {err}", key.display_name(), orders.len());
                    break;
                }
            }
        }

        let model = DetectionModel::new(key, best.orders.clone(), best.params.clone(), truncation);
        let esw = effective_strip_width(key, &model.adjustment_orders, &model.params, truncation);
        let esw_se = covariance.as_ref().and_then(|cov| esw_standard_error(&model, cov));
        let gof = chi_square_gof(&model, esw, &distances, options.gof_bins);
        let survey = SurveySummary::from_table(table, truncation, options);

        log::info!(
            "fitted {}: AIC={:.3}, ESW={:.3}, P_a={:.4}",
            model.label(),
            best.aic,
            esw,
            esw / truncation
        );

        Ok(FittedModel {
            quality: FitQuality {
                n,
                k: model.param_count(),
                log_likelihood: best.log_likelihood,
                aic: best.aic,
            },
            p_a: esw / truncation,
            esw,
            covariance,
            esw_se,
            gof,
            survey,
            iterations: best.iterations,
            model,
        })
    }
}

/// Cosine orders for the first `count` adjustment terms of `key`.
pub fn adjustment_orders(key: KeyFunction, count: usize) -> Vec<u32> {
    let first = key.first_adjustment_order();
    (0..count as u32).map(|i| first + i).collect()
}

#[derive(Debug, Clone)]
struct Candidate {
    orders: Vec<u32>,
    params: Vec<f64>,
    log_likelihood: f64,
    aic: f64,
    iterations: u64,
}

/// Fit one fixed set of adjustment orders, starting from the best of `starts`.
///
/// Starts shorter than the parameter vector are padded with zero coefficients.
fn fit_with_orders(
    key: KeyFunction,
    orders: &[u32],
    truncation: f64,
    distances: &[f64],
    starts: &[Vec<f64>],
    options: &FitOptions,
) -> Result<Candidate, FitError> {
    let problem = DetectionLikelihood::new(key, orders, truncation, distances);
    let dim = problem.dimension();

    // Deterministic selection: lowest cost, ties by grid index.
    let mut start: Option<(Vec<f64>, f64)> = None;
    for s in starts {
        let mut p = s.clone();
        p.resize(dim, 0.0);
        let cost = problem.negative_log_likelihood(&p);
        if start.as_ref().is_none_or(|(_, best)| cost < *best) {
            start = Some((p, cost));
        }
    }
    let Some((start, start_cost)) = start else {
        return Err(FitError::Infeasible { key });
    };
    if start_cost >= INFEASIBLE_COST {
        return Err(FitError::Infeasible { key });
    }

    let simplex = initial_simplex(&start, key.key_param_len());
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(SD_TOLERANCE)
        .map_err(|e| FitError::Optimizer(e.to_string()))?;
    let result = Executor::new(problem.clone(), solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| FitError::Optimizer(e.to_string()))?;

    let state = result.state();
    let iterations = state.get_iter();
    if matches!(state.get_termination_reason(), Some(TerminationReason::MaxItersReached)) {
        return Err(FitError::NotConverged {
            key,
            reason: format!("reached {iterations} iterations"),
        });
    }
    let params = state.get_best_param().cloned().ok_or_else(|| FitError::NotConverged {
        key,
        reason: "no parameters returned".to_string(),
    })?;
    let log_likelihood = problem.log_likelihood(&params).ok_or(FitError::Infeasible { key })?;

    Ok(Candidate {
        orders: orders.to_vec(),
        aic: aic(log_likelihood, params.len()),
        params,
        log_likelihood,
        iterations,
    })
}

fn initial_simplex(start: &[f64], key_len: usize) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.to_vec());
    for i in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[i] += if i < key_len { KEY_STEP } else { ADJUSTMENT_STEP };
        simplex.push(vertex);
    }
    simplex
}

/// Inverse Hessian of `−ln L` at the optimum.
///
/// The gradient comes from central differences; the Hessian from central
/// differences of that gradient with a coarser outer step.
fn parameter_covariance(problem: &DetectionLikelihood<'_>, params: &[f64]) -> Result<DMatrix<f64>, FitError> {
    let dim = params.len();
    let nll = |p: &Vec<f64>| problem.negative_log_likelihood(p);
    let gradient = |p: &Vec<f64>| p.central_diff(&nll);

    let mut hessian = DMatrix::<f64>::zeros(dim, dim);
    for j in 0..dim {
        let mut up = params.to_vec();
        let mut down = params.to_vec();
        up[j] += HESSIAN_STEP;
        down[j] -= HESSIAN_STEP;
        let (g_up, g_down) = (gradient(&up), gradient(&down));
        for i in 0..dim {
            hessian[(i, j)] = (g_up[i] - g_down[i]) / (2.0 * HESSIAN_STEP);
        }
    }
    let hessian = (&hessian + hessian.transpose()) * 0.5;

    if hessian.iter().any(|v| !v.is_finite() || v.abs() >= INFEASIBLE_COST * 1e-3) {
        return Err(FitError::Variance("Hessian is not finite at the optimum".to_string()));
    }
    let covariance = hessian
        .try_inverse()
        .ok_or_else(|| FitError::Variance("Hessian is singular at the optimum".to_string()))?;
    if (0..dim).any(|i| !(covariance[(i, i)] > 0.0)) {
        return Err(FitError::Variance("Hessian is not positive definite at the optimum".to_string()));
    }
    Ok(covariance)
}

/// `se(μ)` by the delta method: `√(∇μᵀ Σ ∇μ)`.
fn esw_standard_error(model: &DetectionModel, covariance: &DMatrix<f64>) -> Option<f64> {
    let esw = |p: &Vec<f64>| effective_strip_width(model.key, &model.adjustment_orders, p, model.truncation);
    let grad = model.params.central_diff(&esw);
    let g = DMatrix::from_column_slice(grad.len(), 1, &grad);
    let var = (g.transpose() * covariance * &g)[(0, 0)];
    (var.is_finite() && var >= 0.0).then(|| var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationConfig, simulated_table};
    use crate::domain::columns;
    use crate::schema::ColumnValues;

    fn options() -> FitOptions {
        FitOptions::default()
    }

    #[test]
    fn adjustment_orders_start_per_key() {
        assert_eq!(adjustment_orders(KeyFunction::HalfNormal, 2), vec![2, 3]);
        assert_eq!(adjustment_orders(KeyFunction::Uniform, 2), vec![1, 2]);
        assert!(adjustment_orders(KeyFunction::HazardRate, 0).is_empty());
    }

    #[test]
    fn recovers_half_normal_scale() {
        let config = SimulationConfig {
            sigma: 25.0,
            ..SimulationConfig::default()
        };
        let table = simulated_table(&config).unwrap();
        let fit = MaximumLikelihoodFitter
            .fit(&table, KeyFunction::HalfNormal, &options())
            .unwrap();

        let sigma = fit.model.scale().unwrap();
        assert!((sigma - 25.0).abs() < 5.0, "sigma={sigma}");
        assert!(fit.esw > 0.0 && fit.esw <= fit.model.truncation);
        assert!((fit.p_a - fit.esw / fit.model.truncation).abs() < 1e-12);
        assert!(fit.esw_se.unwrap() > 0.0);
        assert_eq!(fit.quality.k, fit.model.param_count());
        assert!((fit.aic() - (2.0 * fit.quality.k as f64 - 2.0 * fit.quality.log_likelihood)).abs() < 1e-9);
    }

    #[test]
    fn hazard_rate_and_uniform_fit_simulated_data() {
        let table = simulated_table(&SimulationConfig::default()).unwrap();
        let hr = MaximumLikelihoodFitter
            .fit(&table, KeyFunction::HazardRate, &options())
            .unwrap();
        assert!(hr.model.shape().unwrap() > 0.0);

        let un = MaximumLikelihoodFitter.fit(&table, KeyFunction::Uniform, &options()).unwrap();
        assert!(un.model.adjustment_count() >= 1);
        assert!(un.esw < un.model.truncation);
    }

    #[test]
    fn truncation_excludes_far_detections() {
        let table = simulated_table(&SimulationConfig::default()).unwrap();
        let w = 30.0;
        let fit = MaximumLikelihoodFitter
            .fit(
                &table,
                KeyFunction::HalfNormal,
                &FitOptions {
                    truncation: Some(w),
                    ..options()
                },
            )
            .unwrap();

        let ColumnValues::Real(distances) = table.column(columns::DISTANCE).unwrap() else {
            panic!("distance should be real-valued");
        };
        let within = distances.iter().flatten().filter(|&&d| d <= w).count();
        assert_eq!(fit.quality.n, within);
        assert_eq!(fit.model.truncation, w);
    }

    #[test]
    fn too_few_detections_is_insufficient() {
        let config = SimulationConfig {
            transects: 1,
            visits: 1,
            mean_detections: 0.0,
            ..SimulationConfig::default()
        };
        let table = simulated_table(&config).unwrap();
        let err = MaximumLikelihoodFitter
            .fit(&table, KeyFunction::HalfNormal, &options())
            .unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { n: 0, .. }));
    }
}
