//! Detection-function fitting and model selection.
//!
//! Responsibilities:
//!
//! - maximum-likelihood fit of each key function with cosine adjustments
//! - forward stepwise choice of adjustment terms by AIC
//! - parameter covariance and goodness of fit for each fitted candidate
//! - AIC comparison across keys

pub mod fitter;
pub mod gof;
pub mod likelihood;
pub mod selection;

pub use fitter::*;
pub use gof::*;
pub use likelihood::*;
pub use selection::*;

use thiserror::Error;

use crate::domain::KeyFunction;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("invalid fit options: {0}")]
    InvalidOptions(String),

    #[error("{}: {n} detections within truncation, at least {needed} required", key.display_name())]
    InsufficientData { key: KeyFunction, n: usize, needed: usize },

    #[error("no viable detection model")]
    NoViableModel,

    #[error("{}: no feasible parameters (detection function negative or increasing)", key.display_name())]
    Infeasible { key: KeyFunction },

    #[error("{}: optimiser did not converge ({reason})", key.display_name())]
    NotConverged { key: KeyFunction, reason: String },

    #[error("optimiser failed: {0}")]
    Optimizer(String),

    #[error("variance estimation failed: {0}")]
    Variance(String),
}
