//! Detection-function model implementations.
//!
//! Models are implemented as small, pure functions so that fitting and
//! estimation code can stay generic over the key function.

pub mod detection;

pub use detection::*;
