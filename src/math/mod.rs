//! Mathematical utilities: regression, least squares, optimization, special functions.

pub mod least_squares;
pub mod ols;
pub mod simplex;
pub mod special;

pub use least_squares::*;
pub use ols::*;
pub use simplex::*;
pub use special::*;
