//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - normalized-table and report exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
