//! Reporting utilities: run summaries, dataset tables, saved results.

pub mod format;

pub use format::*;
