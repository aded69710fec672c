//! Input/output helpers.
//!
//! - JSON dataset ingest + validation (`ingest`)
//! - result JSON export/reload (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
