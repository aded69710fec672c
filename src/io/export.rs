//! Result JSON files.
//!
//! The result file is a flat object: `"Hubble constant (H0)"`, its standard
//! error, a `converged` flag and one key per extra parameter. Floats are
//! written with shortest round-trip formatting, so reloading reproduces the
//! values exactly.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::domain::ResultFile;
use crate::error::AppError;

/// `output_js_%Y%m%d_%H%M%S.json` inside `dir`.
pub fn auto_output_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("output_js_{}.json", now.format("%Y%m%d_%H%M%S")))
}

/// Write a result JSON file.
pub fn write_result_json(path: &Path, result: &ResultFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))?;
    Ok(())
}

/// Read a result JSON file.
pub fn read_result_json(path: &Path) -> Result<ResultFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open result JSON '{}': {e}", path.display())))?;
    let result: ResultFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid result JSON: {e}")))?;
    Ok(result)
}
