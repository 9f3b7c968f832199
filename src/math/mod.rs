//! Mathematical utilities: survey geometry, quadrature and search grids.

pub mod geometry;
pub mod grid;
pub mod integrate;

pub use geometry::*;
pub use grid::*;
pub use integrate::*;
