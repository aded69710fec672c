//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - reloaded later for reporting or comparisons

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{EstimateError, EstimateResult};

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Iteration count of the extinction-correction loop.
pub const DEFAULT_CORRECTION_ITERATIONS: usize = 10;

/// Typical ratio of total to selective extinction for interstellar dust.
pub const DEFAULT_R_V: f64 = 3.1;

/// Parameter names. Extra parameters use the labels of the result JSON.
pub const PARAM_H0: &str = "H0";
pub const PARAM_E_BV: &str = "E(B-V)";
pub const PARAM_R_V: &str = "R_V";
pub const PARAM_GAMMA: &str = "Extinction coefficient (gamma)";
pub const PARAM_K: &str = "Extinction coefficient (k)";

/// One paired photometric/redshift measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub apparent_magnitude: f64,
    pub absolute_magnitude: f64,
    pub redshift: f64,
}

impl Observation {
    pub fn new(apparent_magnitude: f64, absolute_magnitude: f64, redshift: f64) -> Self {
        Self {
            apparent_magnitude,
            absolute_magnitude,
            redshift,
        }
    }
}

/// How recession velocity is derived from redshift.
///
/// A fit always uses exactly one of these for every observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VelocityFormula {
    /// `v = c·z`
    Classical,
    /// `v = c·((1+z)² - 1)/((1+z)² + 1)`
    Relativistic,
}

/// Execution backend for per-observation work.
///
/// Both backends produce identical numbers; `Parallel` spreads the work over
/// the rayon thread pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Serial,
    Parallel,
}

/// Stopping rule for the iterative extinction correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationSchedule {
    /// Run exactly this many refinement steps (no convergence check).
    Fixed(usize),
    /// Stop once `|D_new - D| <= rel_tol·D`, or after `max_iterations` steps.
    Tolerance { rel_tol: f64, max_iterations: usize },
}

impl Default for IterationSchedule {
    fn default() -> Self {
        IterationSchedule::Fixed(DEFAULT_CORRECTION_ITERATIONS)
    }
}

/// Which extinction model to fit (CLI-facing, without parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelChoice {
    /// No extinction correction.
    None,
    /// `A_V = k·D` with iterative distance correction.
    LinearDistance,
    /// `A_V = R_V·E(B-V)`.
    ColorExcess,
    /// `A_V = γ·d` with `d = v/H0`.
    Gamma,
}

/// Concrete extinction model used by a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtinctionModel {
    None,
    LinearDistance,
    /// `r_v = Some(x)` holds R_V fixed at `x`; `None` fits it.
    ColorExcess { r_v: Option<f64> },
    Gamma,
}

impl ExtinctionModel {
    pub fn from_choice(choice: ModelChoice, r_v: Option<f64>) -> Self {
        match choice {
            ModelChoice::None => ExtinctionModel::None,
            ModelChoice::LinearDistance => ExtinctionModel::LinearDistance,
            ModelChoice::ColorExcess => ExtinctionModel::ColorExcess { r_v },
            ModelChoice::Gamma => ExtinctionModel::Gamma,
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(&self) -> &'static str {
        match self {
            ExtinctionModel::None => "no extinction",
            ExtinctionModel::LinearDistance => "linear-in-distance (A_V = k·D)",
            ExtinctionModel::ColorExcess { r_v: Some(_) } => "color excess, fixed R_V (A_V = R_V·E(B-V))",
            ExtinctionModel::ColorExcess { r_v: None } => "color excess, free R_V (A_V = R_V·E(B-V))",
            ExtinctionModel::Gamma => "distance-dependent (A_V = γ·v/H0)",
        }
    }

    /// Whether this model is fit on magnitudes rather than on the Hubble diagram.
    pub fn is_magnitude_model(&self) -> bool {
        matches!(self, ExtinctionModel::ColorExcess { .. } | ExtinctionModel::Gamma)
    }

    /// Default parameter vector: bounds and initial guesses of the reference
    /// analyses.
    ///
    /// The first entry is always `H0`, except for `LinearDistance`, whose only
    /// searched parameter is `k` (H0 follows from the regression).
    pub fn default_params(&self) -> Vec<ParamSpec> {
        match self {
            ExtinctionModel::None => vec![ParamSpec::new(PARAM_H0, 70.0, 0.0, 100.0)],
            ExtinctionModel::LinearDistance => vec![ParamSpec::new(PARAM_K, 0.0, 0.0, 0.1)],
            ExtinctionModel::ColorExcess { r_v: Some(r_v) } => vec![
                ParamSpec::new(PARAM_H0, 60.0, 0.0, 100.0),
                ParamSpec::fixed(PARAM_R_V, *r_v),
                ParamSpec::new(PARAM_E_BV, 0.1, 0.0, 3.0),
            ],
            ExtinctionModel::ColorExcess { r_v: None } => vec![
                ParamSpec::new(PARAM_H0, 70.0, 50.0, 100.0),
                ParamSpec::new(PARAM_R_V, DEFAULT_R_V, 2.0, 5.0),
                ParamSpec::new(PARAM_E_BV, 0.1, 0.0, 1.0),
            ],
            ExtinctionModel::Gamma => vec![
                ParamSpec::new(PARAM_H0, 70.0, 50.0, 100.0),
                ParamSpec::new(PARAM_GAMMA, 0.5, 0.0, 1.0),
            ],
        }
    }
}

/// A box-bounded model parameter.
///
/// `lower == upper` holds the parameter fixed at that value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, initial: f64, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            lower,
            upper,
        }
    }

    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, value, value, value)
    }

    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    /// Check that bounds are finite and ordered.
    ///
    /// An initial guess outside the box is not an error; the optimizer clamps it.
    pub fn validate(&self) -> EstimateResult<()> {
        if !(self.lower.is_finite() && self.upper.is_finite() && self.initial.is_finite()) {
            return Err(EstimateError::InvalidConfig(format!(
                "parameter {}: bounds and initial guess must be finite (lower={}, upper={}, initial={})",
                self.name, self.lower, self.upper, self.initial
            )));
        }
        if self.lower > self.upper {
            return Err(EstimateError::InvalidConfig(format!(
                "parameter {}: lower bound {} exceeds upper bound {}",
                self.name, self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Simple linear regression output (velocity on distance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Standard error of the slope.
    pub std_err: f64,
    pub intercept_std_err: f64,
    pub r_value: f64,
    /// Two-sided p-value for the null hypothesis `slope = 0`.
    pub p_value: f64,
    pub n: usize,
}

/// Best-fit Hubble constant plus model-specific extras.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub h0: f64,
    pub std_err: f64,
    pub extra_params: BTreeMap<String, f64>,
    pub extra_errors: BTreeMap<String, f64>,
    /// `false` when the optimizer ran out of iterations; the best point found is
    /// still reported.
    pub converged: bool,
    pub iterations: usize,
    /// Sum of squared residuals of the objective that was minimized.
    pub sse: f64,
    pub n: usize,
}

/// Where the observations come from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    File(PathBuf),
    /// The built-in 19-row reference sample.
    Builtin,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: InputSource,
    pub model: ExtinctionModel,
    pub velocity: VelocityFormula,
    pub schedule: IterationSchedule,
    pub backend: Backend,
    /// Parameter box/guesses; `model.default_params()` when not overridden.
    pub params: Vec<ParamSpec>,
    /// Iteration budget of the simplex search.
    pub max_iterations: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub svg: Option<PathBuf>,

    pub output: Option<PathBuf>,
}

impl FitConfig {
    /// Configuration with the script defaults for `model`.
    pub fn for_model(input: InputSource, model: ExtinctionModel, velocity: VelocityFormula) -> Self {
        Self {
            input,
            params: model.default_params(),
            model,
            velocity,
            schedule: IterationSchedule::default(),
            backend: Backend::Serial,
            max_iterations: 2_000,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            svg: None,
            output: None,
        }
    }
}

/// The saved result file (JSON).
///
/// Key names follow the long-standing result file layout, so older files
/// load too (only `Hubble constant (H0)` is required).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    #[serde(rename = "Hubble constant (H0)")]
    pub h0: f64,
    #[serde(rename = "H0 standard error", default, skip_serializing_if = "Option::is_none")]
    pub h0_std_err: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_converged")]
    pub converged: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

fn default_converged() -> bool {
    true
}

impl ResultFile {
    pub fn from_fit(fit: &FitResult, model: &ExtinctionModel) -> Self {
        Self {
            h0: fit.h0,
            h0_std_err: fit.std_err.is_finite().then_some(fit.std_err),
            model: Some(model.display_name().to_string()),
            converged: fit.converged,
            extra: fit
                .extra_params
                .iter()
                .filter(|(_, v)| v.is_finite())
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}
