//! Command-line parsing for the Hubble constant estimator.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Path-like options fall back to environment variables
//! (a `.env` file is loaded before parsing).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Backend, ModelChoice, VelocityFormula};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "hubble", version, about = "Hubble constant estimator with extinction correction")]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write the run log to `<DIR>/logfile_<timestamp>.log`.
    #[arg(long, global = true, env = "HUBBLE_LOG_DIR", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit H0 (and extinction parameters), print the result, optionally plot/export.
    Fit(FitArgs),
    /// Print the dataset with derived distances and velocities.
    Inspect(InspectArgs),
    /// Write a seeded synthetic dataset in the input JSON format.
    Simulate(SimulateArgs),
    /// Print a previously saved result JSON.
    Show(ShowArgs),
}

/// Where observations come from.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Input JSON (column object or array of rows).
    #[arg(short, long, env = "HUBBLE_INPUT", value_name = "JSON", required_unless_present = "builtin")]
    pub input: Option<PathBuf>,

    /// Use the built-in 19-observation sample instead of a file (wins over `--input`).
    #[arg(long)]
    pub builtin: bool,
}

/// Options for fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub source: InputArgs,

    /// Extinction model.
    #[arg(short, long, value_enum, default_value_t = ModelChoice::None)]
    pub model: ModelChoice,

    /// Velocity formula.
    #[arg(long, value_enum, default_value_t = VelocityFormula::Classical)]
    pub velocity: VelocityFormula,

    /// Hold R_V fixed at this value (color-excess model).
    #[arg(long, default_value_t = crate::domain::DEFAULT_R_V, conflicts_with = "free_r_v")]
    pub r_v: f64,

    /// Fit R_V instead of holding it fixed (color-excess model).
    #[arg(long)]
    pub free_r_v: bool,

    /// Override a parameter box as NAME=INITIAL:LOWER:UPPER (repeatable).
    /// Use LOWER == UPPER to hold the parameter fixed.
    #[arg(long = "param", value_name = "SPEC")]
    pub params: Vec<String>,

    /// Fixed number of distance-correction iterations.
    #[arg(long, default_value_t = crate::domain::DEFAULT_CORRECTION_ITERATIONS)]
    pub correction_iterations: usize,

    /// Iterate the distance correction to this relative tolerance instead.
    #[arg(long, value_name = "REL_TOL")]
    pub correction_tol: Option<f64>,

    /// Execution backend for per-observation work.
    #[arg(long, value_enum, default_value_t = Backend::Serial)]
    pub backend: Backend,

    /// Iteration budget of the simplex search.
    #[arg(long, default_value_t = 2_000)]
    pub max_iterations: usize,

    /// Render an ASCII plot in the terminal.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Write the chart as SVG.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,

    /// Write the result JSON here.
    #[arg(short, long, env = "HUBBLE_OUTPUT", value_name = "JSON")]
    pub output: Option<PathBuf>,

    /// Write the result JSON as `output_js_<timestamp>.json` in the working directory
    /// (wins over `--output`).
    #[arg(long)]
    pub output_auto: bool,
}

/// Options for inspecting a dataset.
#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: InputArgs,
}

/// Options for synthetic data generation.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output JSON path.
    #[arg(short, long, value_name = "JSON")]
    pub output: PathBuf,

    /// Number of observations.
    #[arg(short = 'n', long, default_value_t = 19)]
    pub count: usize,

    /// True Hubble constant (km/s/Mpc).
    #[arg(long, default_value_t = 70.0)]
    pub h0: f64,

    /// True extinction coefficient k (mag/Mpc).
    #[arg(long, default_value_t = 0.0)]
    pub k: f64,

    /// Gaussian noise on apparent magnitudes (mag).
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,

    /// Minimum redshift.
    #[arg(long, default_value_t = 0.003)]
    pub z_min: f64,

    /// Maximum redshift.
    #[arg(long, default_value_t = 0.037)]
    pub z_max: f64,

    /// Velocity formula used to place the true distances.
    #[arg(long, value_enum, default_value_t = VelocityFormula::Classical)]
    pub velocity: VelocityFormula,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for printing a saved result.
#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Result JSON produced by `hubble fit --output`.
    #[arg(value_name = "JSON")]
    pub result: PathBuf,
}
