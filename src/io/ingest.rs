//! JSON dataset ingest.
//!
//! Two layouts are accepted:
//!
//! - **columns**: one object whose keys map to equal-length number arrays
//!   (the historical layout)
//! - **rows**: an array of objects, one per observation, with the same keys
//!
//! Key matching ignores case, surrounding whitespace and a UTF-8 BOM. The
//! apparent-magnitude key is accepted both in its historical misspelling
//! (`Apparent Magitude (m)`) and spelled correctly.
//!
//! Design goals:
//! - **Strict schema**: a missing key or a non-numeric value is a
//!   `DataLoad` error naming the key (and row, where there is one)
//! - **No silent repair**: unequal column lengths are rejected, never truncated
//! - **No fitting logic here**

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde_json::{Map, Value};

use crate::data::builtin_observations;
use crate::domain::{InputSource, Observation};
use crate::error::{EstimateError, EstimateResult};

/// Key written for apparent magnitude (misspelled, as in the existing data files).
pub const KEY_APPARENT: &str = "Apparent Magitude (m)";
/// Correctly spelled alias accepted on input.
pub const KEY_APPARENT_ALIAS: &str = "Apparent Magnitude (m)";
pub const KEY_ABSOLUTE: &str = "Absolute Magnitude (M)";
pub const KEY_REDSHIFT: &str = "Redshift (z)";

/// Summary of a loaded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_points: usize,
    pub redshift_min: f64,
    pub redshift_max: f64,
    pub apparent_min: f64,
    pub apparent_max: f64,
}

impl DatasetStats {
    /// `None` for an empty dataset or one containing non-finite values.
    pub fn from_observations(observations: &[Observation]) -> Option<Self> {
        let mut z_min = f64::INFINITY;
        let mut z_max = f64::NEG_INFINITY;
        let mut m_min = f64::INFINITY;
        let mut m_max = f64::NEG_INFINITY;

        for o in observations {
            z_min = z_min.min(o.redshift);
            z_max = z_max.max(o.redshift);
            m_min = m_min.min(o.apparent_magnitude);
            m_max = m_max.max(o.apparent_magnitude);
        }

        if ![z_min, z_max, m_min, m_max].iter().all(|v| v.is_finite()) {
            return None;
        }

        Some(Self {
            n_points: observations.len(),
            redshift_min: z_min,
            redshift_max: z_max,
            apparent_min: m_min,
            apparent_max: m_max,
        })
    }
}

/// Load observations from a file or the built-in sample.
pub fn load_observations(source: &InputSource) -> EstimateResult<Vec<Observation>> {
    match source {
        InputSource::Builtin => Ok(builtin_observations()),
        InputSource::File(path) => read_observations_json(path),
    }
}

/// Read and parse a dataset file.
pub fn read_observations_json(path: &Path) -> EstimateResult<Vec<Observation>> {
    let file = File::open(path)
        .map_err(|e| EstimateError::DataLoad(format!("failed to open '{}': {e}", path.display())))?;
    let value: Value = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| EstimateError::DataLoad(format!("'{}' is not valid JSON: {e}", path.display())))?;
    observations_from_value(&value)
}

/// Parse a dataset from JSON text.
pub fn parse_observations(text: &str) -> EstimateResult<Vec<Observation>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| EstimateError::DataLoad(format!("invalid JSON: {e}")))?;
    observations_from_value(&value)
}

/// Write observations in the column layout.
pub fn write_observations_json(path: &Path, observations: &[Observation]) -> EstimateResult<()> {
    let column = |f: fn(&Observation) -> f64| Value::from(observations.iter().map(f).collect::<Vec<f64>>());

    let mut doc = Map::new();
    doc.insert(KEY_APPARENT.to_string(), column(|o| o.apparent_magnitude));
    doc.insert(KEY_ABSOLUTE.to_string(), column(|o| o.absolute_magnitude));
    doc.insert(KEY_REDSHIFT.to_string(), column(|o| o.redshift));

    let file = File::create(path)
        .map_err(|e| EstimateError::DataLoad(format!("failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &Value::Object(doc))
        .map_err(|e| EstimateError::DataLoad(format!("failed to write '{}': {e}", path.display())))
}

fn observations_from_value(value: &Value) -> EstimateResult<Vec<Observation>> {
    match value {
        Value::Object(map) => from_columns(map),
        Value::Array(rows) => from_rows(rows),
        other => Err(EstimateError::DataLoad(format!(
            "expected an object of columns or an array of rows, found {}",
            json_kind(other)
        ))),
    }
}

fn from_columns(map: &Map<String, Value>) -> EstimateResult<Vec<Observation>> {
    let keys = build_key_map(map);
    let apparent = number_column(map, &keys, apparent_key(&keys)?)?;
    let absolute = number_column(map, &keys, KEY_ABSOLUTE)?;
    let redshift = number_column(map, &keys, KEY_REDSHIFT)?;

    if apparent.len() != absolute.len() || apparent.len() != redshift.len() {
        return Err(EstimateError::DataLoad(format!(
            "columns differ in length: {KEY_APPARENT}={}, {KEY_ABSOLUTE}={}, {KEY_REDSHIFT}={}",
            apparent.len(),
            absolute.len(),
            redshift.len()
        )));
    }

    Ok(apparent
        .into_iter()
        .zip(absolute)
        .zip(redshift)
        .map(|((m, abs_m), z)| Observation::new(m, abs_m, z))
        .collect())
}

fn from_rows(rows: &[Value]) -> EstimateResult<Vec<Observation>> {
    rows.iter()
        .enumerate()
        .map(|(row, value)| {
            let Value::Object(map) = value else {
                return Err(EstimateError::DataLoad(format!(
                    "row {row}: expected an object, found {}",
                    json_kind(value)
                )));
            };
            let keys = build_key_map(map);
            let field = |name: &str| -> EstimateResult<f64> {
                let v = lookup(map, &keys, name)
                    .ok_or_else(|| EstimateError::DataLoad(format!("row {row}: missing key '{name}'")))?;
                as_number(v).ok_or_else(|| {
                    EstimateError::DataLoad(format!("row {row}: '{name}' is not a number ({})", json_kind(v)))
                })
            };
            Ok(Observation::new(
                field(apparent_key(&keys)?)?,
                field(KEY_ABSOLUTE)?,
                field(KEY_REDSHIFT)?,
            ))
        })
        .collect()
}

fn build_key_map(map: &Map<String, Value>) -> HashMap<String, String> {
    map.keys().map(|k| (normalize_key(k), k.clone())).collect()
}

fn normalize_key(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn apparent_key(keys: &HashMap<String, String>) -> EstimateResult<&'static str> {
    [KEY_APPARENT, KEY_APPARENT_ALIAS]
        .into_iter()
        .find(|k| keys.contains_key(&normalize_key(k)))
        .ok_or_else(|| EstimateError::DataLoad(format!("missing key '{KEY_APPARENT}' (or '{KEY_APPARENT_ALIAS}')")))
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &HashMap<String, String>, name: &str) -> Option<&'a Value> {
    keys.get(&normalize_key(name)).and_then(|original| map.get(original))
}

fn number_column(map: &Map<String, Value>, keys: &HashMap<String, String>, name: &str) -> EstimateResult<Vec<f64>> {
    let value = lookup(map, keys, name).ok_or_else(|| EstimateError::DataLoad(format!("missing key '{name}'")))?;
    let Value::Array(items) = value else {
        return Err(EstimateError::DataLoad(format!(
            "'{name}' must be an array of numbers, found {}",
            json_kind(value)
        )));
    };
    items
        .iter()
        .enumerate()
        .map(|(row, v)| {
            as_number(v).ok_or_else(|| {
                EstimateError::DataLoad(format!("'{name}' at row {row} is not a number ({})", json_kind(v)))
            })
        })
        .collect()
}

fn as_number(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
