//! Shared analysis pipeline used by every subcommand.
//!
//! The workflow runs strictly in order:
//! load -> derive distances -> normalize -> fit candidates -> select by AIC -> estimate
//!
//! The CLI handlers only decide how much of it to run and what to print.

use std::path::Path;

use crate::config::SurveyConfig;
use crate::domain::SurveyData;
use crate::error::AppError;
use crate::estimate::Estimates;
use crate::fit::{DetectionFitter, FitOptions, MaximumLikelihoodFitter, Selection, fit_and_select};
use crate::io::load_survey;
use crate::report::{DatasetSummary, Report};
use crate::schema::{DistanceTable, SchemaError, normalize};

/// Loaded survey and its normalized table.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub survey: SurveyData,
    pub table: DistanceTable,
    pub dataset: DatasetSummary,
}

/// All computed outputs of a single `dsurvey analyze` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub prepared: Prepared,
    pub selection: Selection,
    pub estimates: Estimates,
    pub report: Report,
}

/// Steps 1-3: load, derive perpendicular distances and normalize.
pub fn prepare_table(path: &Path, config: &SurveyConfig) -> Result<Prepared, AppError> {
    config.validate()?;

    let mut survey = load_survey(path, &config.input)?;
    let rejected = survey.derive_distances(config.input.angle_policy);
    if rejected > 0 {
        log::warn!("{rejected} sighting(s) rejected by the geometry transform; their effort is kept");
    }
    if survey.observations.is_empty() {
        return Err(AppError::from(SchemaError::NoSamples));
    }
    if survey.detection_count() == 0 {
        return Err(AppError::from(SchemaError::NoDetections));
    }

    let table = normalize(&survey, &config.design)?;
    let dataset = DatasetSummary::new(path.display().to_string(), &survey, &table);
    log::info!(
        "loaded {} of {} rows ({} detections, {} transects)",
        dataset.rows_used,
        dataset.rows_read,
        dataset.detections,
        dataset.transects
    );

    Ok(Prepared {
        survey,
        table,
        dataset,
    })
}

/// Steps 4-5 on a prepared table.
pub fn select_model<F: DetectionFitter>(
    fitter: &F,
    table: &DistanceTable,
    config: &SurveyConfig,
) -> Result<Selection, AppError> {
    let options = FitOptions::from_config(config);
    Ok(fit_and_select(fitter, table, &config.fitting.keys, &options)?)
}

/// Execute the full pipeline with the bundled maximum-likelihood fitter.
pub fn run_analysis(path: &Path, config: &SurveyConfig) -> Result<RunOutput, AppError> {
    run_analysis_with(&MaximumLikelihoodFitter, path, config)
}

/// Execute the full pipeline with any fitter.
pub fn run_analysis_with<F: DetectionFitter>(
    fitter: &F,
    path: &Path,
    config: &SurveyConfig,
) -> Result<RunOutput, AppError> {
    let prepared = prepare_table(path, config)?;
    let selection = select_model(fitter, &prepared.table, config)?;
    let estimates = selection.best_fit().estimate()?;
    let report = Report::new(prepared.dataset.clone(), &selection, estimates.clone());

    Ok(RunOutput {
        prepared,
        selection,
        estimates,
        report,
    })
}
