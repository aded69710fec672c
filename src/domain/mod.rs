//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations and model selection (`Observation`, `ExtinctionModel`, `VelocityFormula`)
//! - fitting knobs (`ParamSpec`, `IterationSchedule`, `Backend`, `FitConfig`)
//! - fit outputs (`LinearFit`, `FitResult`, `ResultFile`)

pub mod types;

pub use types::*;
