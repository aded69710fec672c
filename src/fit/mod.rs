//! Fitting entry points.
//!
//! Responsibilities:
//!
//! - linear Hubble-law regression on distance/velocity arrays (`hubble`)
//! - bounded non-linear fits on apparent magnitudes (`fitter`)
//! - search for the linear-in-distance extinction coefficient (`extinction`)

pub mod extinction;
pub mod fitter;
pub mod hubble;

pub use extinction::*;
pub use fitter::*;
pub use hubble::*;
