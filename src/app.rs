//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - runs the estimation pipeline
//! - prints reports/plots
//! - writes optional exports

use std::path::Path;

use chrono::Local;
use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, InputArgs, InspectArgs, ShowArgs, SimulateArgs};
use crate::data::{SimulationConfig, generate_observations};
use crate::domain::{ExtinctionModel, FitConfig, InputSource, IterationSchedule, ParamSpec, ResultFile};
use crate::error::AppError;

pub mod logging;
pub mod observer;
pub mod pipeline;

use observer::LogObserver;

/// Step budget of the distance correction when iterating to a tolerance.
const TOLERANCE_MAX_ITERATIONS: usize = 1_000;

/// Entry point for the `hubble` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let started = Local::now();
    if let Some(path) = logging::init_logging(cli.verbose, cli.log_dir.as_deref(), started)? {
        eprintln!("Logging to {}", path.display());
    }
    let observer = LogObserver::new(started.format("%Y%m%d_%H%M%S").to_string());

    match cli.command {
        Command::Fit(args) => handle_fit(args, &observer),
        Command::Inspect(args) => handle_inspect(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_fit(args: FitArgs, observer: &LogObserver) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config, observer)?;

    println!("{}", crate::report::format_run_summary(&run, &config));

    let line = crate::plot::FitLine::from_run(&run);
    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            &run.distances,
            &run.velocities,
            line,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }
    if let Some(path) = &config.svg {
        crate::plot::write_svg_plot(path, &run.distances, &run.velocities, line, run.model.display_name())?;
        log::info!("[{}] wrote chart to {}", observer.run_id(), path.display());
    }

    // Optional export.
    if let Some(path) = &config.output {
        let result = ResultFile::from_fit(&run.fit, &run.model);
        crate::io::write_result_json(path, &result)?;
        println!("Saved result to {}", path.display());
        log::info!("[{}] saved result to {}", observer.run_id(), path.display());
    }

    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let observations = crate::io::load_observations(&input_source(&args.source)?)?;
    println!("{}", crate::report::format_observation_table(&observations));
    if let Some(stats) = crate::io::DatasetStats::from_observations(&observations) {
        println!(
            "n={} | z=[{:.5}, {:.5}] | m=[{:.2}, {:.2}]",
            stats.n_points, stats.redshift_min, stats.redshift_max, stats.apparent_min, stats.apparent_max
        );
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = SimulationConfig {
        count: args.count,
        h0: args.h0,
        extinction_k: args.k,
        noise_sigma: args.noise,
        z_min: args.z_min,
        z_max: args.z_max,
        velocity: args.velocity,
        seed: args.seed,
        ..SimulationConfig::default()
    };
    let observations = generate_observations(&config)?;
    crate::io::write_observations_json(&args.output, &observations)?;
    println!("Wrote {} observations to {}", observations.len(), args.output.display());
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let result = crate::io::read_result_json(&args.result)?;
    print!("{}", crate::report::format_result_file(&result));
    Ok(())
}

/// `--builtin` wins over a path, which may come from `HUBBLE_INPUT`.
fn input_source(args: &InputArgs) -> Result<InputSource, AppError> {
    match (&args.input, args.builtin) {
        (_, true) => Ok(InputSource::Builtin),
        (Some(path), false) => Ok(InputSource::File(path.clone())),
        (None, false) => Err(AppError::new(2, "No input given: pass --input <JSON> or --builtin.")),
    }
}

/// Translate CLI flags into a pipeline configuration.
pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let r_v = (!args.free_r_v).then_some(args.r_v);
    let model = ExtinctionModel::from_choice(args.model, r_v);

    let mut config = FitConfig::for_model(input_source(&args.source)?, model, args.velocity);
    for spec in &args.params {
        apply_param_override(&mut config.params, spec)?;
    }

    config.schedule = match args.correction_tol {
        Some(rel_tol) if rel_tol.is_finite() && rel_tol > 0.0 => IterationSchedule::Tolerance {
            rel_tol,
            max_iterations: TOLERANCE_MAX_ITERATIONS,
        },
        Some(rel_tol) => {
            return Err(AppError::new(2, format!("--correction-tol must be positive, got {rel_tol}")));
        }
        None => IterationSchedule::Fixed(args.correction_iterations),
    };
    config.backend = args.backend;
    config.max_iterations = args.max_iterations;
    config.plot = args.plot;
    config.plot_width = args.width;
    config.plot_height = args.height;
    config.svg = args.svg.clone();
    // `--output-auto` wins over a path, which may come from `HUBBLE_OUTPUT`.
    config.output = if args.output_auto {
        Some(crate::io::auto_output_path(Path::new("."), Local::now()))
    } else {
        args.output.clone()
    };

    Ok(config)
}

/// Apply `NAME=INITIAL:LOWER:UPPER` (or `NAME=VALUE` to fix) to the matching parameter.
fn apply_param_override(params: &mut [ParamSpec], spec: &str) -> Result<(), AppError> {
    let bad = || AppError::new(2, format!("Invalid --param '{spec}': expected NAME=INITIAL:LOWER:UPPER or NAME=VALUE"));

    let (name, values) = spec.split_once('=').ok_or_else(bad)?;
    let name = name.trim();
    let values: Vec<f64> = values
        .split(':')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;

    let known: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
    let target = params
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            AppError::new(
                2,
                format!("Unknown parameter '{name}' for this model (known: {})", known.join(", ")),
            )
        })?;

    let updated = match values.as_slice() {
        [value] => ParamSpec::fixed(target.name.clone(), *value),
        [initial, lower, upper] => ParamSpec::new(target.name.clone(), *initial, *lower, *upper),
        _ => return Err(bad()),
    };
    updated.validate()?;
    *target = updated;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{PARAM_H0, PARAM_K, PARAM_R_V};

    fn parse_fit(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["hubble", "fit", "--builtin"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Fit(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_defaults_follow_the_model() {
        let config = fit_config_from_args(&parse_fit(&["--model", "color-excess"])).unwrap();
        assert_eq!(config.model, ExtinctionModel::ColorExcess { r_v: Some(3.1) });
        assert_eq!(config.params.len(), 3);
        assert_eq!(config.schedule, IterationSchedule::Fixed(10));
        assert_eq!(config.input, InputSource::Builtin);

        let config = fit_config_from_args(&parse_fit(&["--model", "color-excess", "--free-r-v"])).unwrap();
        assert_eq!(config.model, ExtinctionModel::ColorExcess { r_v: None });
        assert!(!config.params.iter().find(|p| p.name == PARAM_R_V).unwrap().is_fixed());
    }

    #[test]
    fn param_overrides_replace_bounds_or_fix() {
        let config = fit_config_from_args(&parse_fit(&["--model", "gamma", "--param", "h0=68:60:75"])).unwrap();
        assert_eq!(config.params[0], ParamSpec::new(PARAM_H0, 68.0, 60.0, 75.0));

        let config = fit_config_from_args(&parse_fit(&[
            "--model",
            "linear-distance",
            "--param",
            "Extinction coefficient (k)=0.001",
        ]))
        .unwrap();
        assert_eq!(config.params[0], ParamSpec::fixed(PARAM_K, 0.001));
    }

    #[test]
    fn bad_overrides_are_input_errors() {
        for spec in ["H0", "H0=1:2", "H0=a:b:c", "nope=1", "H0=70:100:50"] {
            let err = fit_config_from_args(&parse_fit(&["--param", spec])).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{spec}");
        }
    }

    #[test]
    fn flags_win_over_paths_from_the_environment() {
        // SAFETY: the variables are only read by clap while parsing, and no
        // other test depends on their absence.
        unsafe {
            std::env::set_var("HUBBLE_INPUT", "from-env.json");
            std::env::set_var("HUBBLE_OUTPUT", "from-env-result.json");
        }
        let parsed = Cli::try_parse_from(["hubble", "fit", "--builtin", "--output-auto"]);
        let env_only = Cli::try_parse_from(["hubble", "fit"]);
        unsafe {
            std::env::remove_var("HUBBLE_INPUT");
            std::env::remove_var("HUBBLE_OUTPUT");
        }

        let Command::Fit(args) = parsed.unwrap().command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.input, InputSource::Builtin);
        let output = config.output.unwrap();
        assert!(output.to_string_lossy().contains("output_js_"), "{}", output.display());

        let Command::Fit(args) = env_only.unwrap().command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.input, InputSource::File(PathBuf::from("from-env.json")));
        assert_eq!(config.output, Some(PathBuf::from("from-env-result.json")));
    }

    #[test]
    fn tolerance_schedule() {
        let config = fit_config_from_args(&parse_fit(&["--correction-tol", "1e-9"])).unwrap();
        assert_eq!(
            config.schedule,
            IterationSchedule::Tolerance {
                rel_tol: 1e-9,
                max_iterations: TOLERANCE_MAX_ITERATIONS
            }
        );
        assert!(fit_config_from_args(&parse_fit(&["--correction-tol", "0"])).is_err());
    }
}
