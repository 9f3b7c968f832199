//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input configuration enums (`KeyFunction`, `AnglePolicy`)
//! - loaded survey rows (`Observation`, `Sighting`, `SurveyData`)
//! - survey design (`Stratum`, `Transect`)
//! - fit outputs (`DetectionModel`, `FitQuality`)

pub mod types;

pub use types::*;
