//! Datasets that do not come from an input file.
//!
//! - the built-in 19-row reference sample
//! - seeded synthetic samples with a known Hubble constant

pub mod sample;

pub use sample::*;
