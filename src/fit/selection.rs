//! Model selection across key functions using AIC.
//!
//! Every requested key is fitted (with its own stepwise adjustment terms) and:
//! - keys that cannot be fitted are recorded as skipped, not fatal
//! - `ΔAIC = AIC − min AIC` is computed over the remaining fits
//! - the model with `ΔAIC = 0` is chosen
//!
//! Ties are broken by fewest adjustment terms, then fewest parameters, then
//! input order.

use serde::Serialize;

use crate::domain::KeyFunction;
use crate::fit::FitError;
use crate::fit::fitter::{DetectionFitter, FitOptions, FittedModel};
use crate::schema::DistanceTable;

/// AIC values closer than this are treated as tied.
const AIC_TIE_TOL: f64 = 1e-9;

/// Anything that can be ranked by AIC.
pub trait AicCandidate {
    fn aic(&self) -> f64;
    fn adjustment_count(&self) -> usize;
    fn param_count(&self) -> usize;
}

impl AicCandidate for FittedModel {
    fn aic(&self) -> f64 {
        self.quality.aic
    }

    fn adjustment_count(&self) -> usize {
        self.model.adjustment_count()
    }

    fn param_count(&self) -> usize {
        self.model.param_count()
    }
}

/// `AIC_i − min AIC` for each value.
pub fn delta_aic(aics: &[f64]) -> Vec<f64> {
    let min = aics.iter().copied().fold(f64::INFINITY, f64::min);
    aics.iter().map(|a| a - min).collect()
}

/// Index of the chosen candidate.
pub fn select_by_aic<C: AicCandidate>(candidates: &[C]) -> Result<usize, FitError> {
    if candidates.is_empty() {
        return Err(FitError::NoViableModel);
    }
    let aics: Vec<f64> = candidates.iter().map(AicCandidate::aic).collect();
    if aics.iter().any(|a| !a.is_finite()) {
        return Err(FitError::Optimizer("non-finite AIC among candidates".to_string()));
    }
    let deltas = delta_aic(&aics);

    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if deltas[i] > AIC_TIE_TOL {
            continue;
        }
        best = match best {
            None => Some(i),
            Some(b) => {
                let incumbent = &candidates[b];
                let simpler = (c.adjustment_count(), c.param_count())
                    < (incumbent.adjustment_count(), incumbent.param_count());
                Some(if simpler { i } else { b })
            }
        };
    }
    best.ok_or(FitError::NoViableModel)
}

/// One line of the AIC comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRow {
    pub key: KeyFunction,
    pub label: String,
    pub adjustments: usize,
    pub k: usize,
    pub log_likelihood: f64,
    pub aic: f64,
    pub delta_aic: f64,
    pub esw: f64,
    pub p_a: f64,
    pub p_a_se: Option<f64>,
    pub gof_p: Option<f64>,
    pub chosen: bool,
}

/// A key that produced no viable model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCandidate {
    pub key: KeyFunction,
    pub reason: String,
}

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Index of the chosen model in `fits`.
    pub best: usize,
    /// Successful fits, in key order.
    pub fits: Vec<FittedModel>,
    /// Comparison table, sorted by ΔAIC.
    pub table: Vec<CandidateRow>,
    pub skipped: Vec<SkippedCandidate>,
}

impl Selection {
    pub fn best_fit(&self) -> &FittedModel {
        &self.fits[self.best]
    }
}

/// Fit every key and select by AIC.
pub fn fit_and_select<F: DetectionFitter>(
    fitter: &F,
    table: &DistanceTable,
    keys: &[KeyFunction],
    options: &FitOptions,
) -> Result<Selection, FitError> {
    if keys.is_empty() {
        return Err(FitError::InvalidOptions("no key functions requested".to_string()));
    }
    options.validate()?;

    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    for &key in keys {
        match fitter.fit(table, key, options) {
            Ok(fit) => fits.push(fit),
            Err(err @ FitError::InvalidOptions(_)) => return Err(err),
            Err(err) => {
                log::warn!("{}: no viable model ({err})", key.display_name());
                skipped.push(SkippedCandidate {
                    key,
                    reason: err.to_string(),
                });
            }
        }
    }

    let best = select_by_aic(&fits)?;
    let deltas = delta_aic(&fits.iter().map(AicCandidate::aic).collect::<Vec<_>>());

    let mut rows: Vec<CandidateRow> = fits
        .iter()
        .zip(&deltas)
        .enumerate()
        .map(|(i, (fit, &delta))| CandidateRow {
            key: fit.model.key,
            label: fit.model.label(),
            adjustments: fit.model.adjustment_count(),
            k: fit.quality.k,
            log_likelihood: fit.quality.log_likelihood,
            aic: fit.quality.aic,
            delta_aic: delta,
            esw: fit.esw,
            p_a: fit.p_a,
            p_a_se: fit.p_a_se(),
            gof_p: fit.gof.p_value,
            chosen: i == best,
        })
        .collect();
    rows.sort_by(|a, b| b.chosen.cmp(&a.chosen).then(a.delta_aic.total_cmp(&b.delta_aic)));

    log::info!(
        "selected {} (AIC {:.3}) from {} candidate(s), {} skipped",
        fits[best].model.label(),
        fits[best].quality.aic,
        fits.len(),
        skipped.len()
    );

    Ok(Selection {
        best,
        fits,
        table: rows,
        skipped,
    })
}
