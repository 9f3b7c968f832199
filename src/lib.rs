//! `distance-survey` library crate.
//!
//! The binary (`dsurvey`) is a thin wrapper around this library so that:
//!
//! - the analysis is testable without spawning processes
//! - the fitter can be swapped behind [`fit::DetectionFitter`]
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod schema;
