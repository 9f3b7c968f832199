//! Synthetic survey data.

pub mod simulate;

pub use simulate::*;
