//! Canonical model-input schema.
//!
//! Detection-function fitting consumes a flat table with the columns
//! `distance`, `Sample.Label`, `Effort`, `Region.Label`, `Area` and `size`.
//! `normalize` builds that table from the loaded survey; `DistanceTable` owns
//! it and guards the one-shot effort scaling.

pub mod normalize;
pub mod table;

pub use normalize::*;
pub use table::*;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing required column for {role}: `{column}`")]
    MissingColumn { role: &'static str, column: String },

    #[error("column `{0}` appears more than once in the header or column mapping")]
    DuplicateColumn(String),

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("effort has already been scaled by {visits} visits")]
    EffortAlreadyScaled { visits: u32 },

    #[error("visit count must be >= 1")]
    InvalidVisits,

    #[error("stratum area must be finite and > 0 (got {0})")]
    InvalidArea(f64),

    #[error("stratum label must not be empty")]
    EmptyRegionLabel,

    #[error("transect `{sample}` has invalid effort {effort}")]
    InvalidEffort { sample: String, effort: f64 },

    #[error("transect `{sample}` has inconsistent base effort ({first} vs {second})")]
    InconsistentEffort { sample: String, first: f64, second: f64 },

    #[error("line {line}: detection has no derived perpendicular distance")]
    MissingDistance { line: usize },

    #[error("no survey rows remain after validation")]
    NoSamples,

    #[error("no valid detections in the survey")]
    NoDetections,
}
