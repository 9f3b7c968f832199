//! Analysis report: what was loaded, which models were compared, what was
//! chosen and what it estimates.
//!
//! `Report` is the only persisted output of an analysis (as JSON); the same
//! data drives the terminal summary in `format`.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::{KeyFunction, RowError, SurveyData};
use crate::estimate::Estimates;
use crate::fit::{CandidateRow, FittedModel, GoodnessOfFit, Selection, SkippedCandidate};
use crate::schema::DistanceTable;

/// Loader and normalizer statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub input: String,
    pub rows_read: usize,
    pub rows_used: usize,
    pub detections: usize,
    pub transects: usize,
    pub visits: Option<u32>,
    pub total_effort: f64,
    pub region_label: String,
    pub area: f64,
    /// `(min, max)` perpendicular distance.
    pub distance_range: Option<(f64, f64)>,
    pub row_errors: Vec<RowError>,
}

impl DatasetSummary {
    /// Summarise a survey after distance derivation and its normalized table.
    pub fn new(input: impl Into<String>, survey: &SurveyData, table: &DistanceTable) -> Self {
        Self {
            input: input.into(),
            rows_read: survey.rows_read,
            rows_used: table.len(),
            detections: table.detections().count(),
            transects: table.transects().len(),
            visits: table.visits_applied(),
            total_effort: table.total_effort(),
            region_label: table.stratum().label.clone(),
            area: table.stratum().area,
            distance_range: survey.distance_range(),
            row_errors: survey.row_errors.clone(),
        }
    }
}

/// Parameters and diagnostics of the selected detection function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChosenModel {
    pub label: String,
    pub key: KeyFunction,
    pub adjustment_orders: Vec<u32>,
    /// Raw parameter vector (key parameters on the log scale).
    pub params: Vec<f64>,
    pub scale: Option<f64>,
    pub shape: Option<f64>,
    pub truncation: f64,
    /// Detections beyond the truncation distance.
    pub truncated: usize,
    pub n: usize,
    pub log_likelihood: f64,
    pub aic: f64,
    pub esw: f64,
    pub esw_se: Option<f64>,
    pub p_a: f64,
    pub p_a_se: Option<f64>,
    pub gof: GoodnessOfFit,
    pub iterations: u64,
}

impl From<&FittedModel> for ChosenModel {
    fn from(fit: &FittedModel) -> Self {
        Self {
            label: fit.model.label(),
            key: fit.model.key,
            adjustment_orders: fit.model.adjustment_orders.clone(),
            params: fit.model.params.clone(),
            scale: fit.model.scale(),
            shape: fit.model.shape(),
            truncation: fit.model.truncation,
            truncated: fit.survey.truncated,
            n: fit.quality.n,
            log_likelihood: fit.quality.log_likelihood,
            aic: fit.quality.aic,
            esw: fit.esw,
            esw_se: fit.esw_se,
            p_a: fit.p_a,
            p_a_se: fit.p_a_se(),
            gof: fit.gof.clone(),
            iterations: fit.iterations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub dataset: DatasetSummary,
    pub candidates: Vec<CandidateRow>,
    pub skipped: Vec<SkippedCandidate>,
    pub chosen: ChosenModel,
    pub estimates: Estimates,
}

impl Report {
    pub fn new(dataset: DatasetSummary, selection: &Selection, estimates: Estimates) -> Self {
        Self {
            dataset,
            candidates: selection.table.clone(),
            skipped: selection.skipped.clone(),
            chosen: ChosenModel::from(selection.best_fit()),
            estimates,
        }
    }
}
