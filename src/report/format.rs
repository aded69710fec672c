//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::RunOutput;
use crate::domain::{FitConfig, InputSource, LinearFit, Observation, PARAM_H0, ResultFile, VelocityFormula};
use crate::io::DatasetStats;
use crate::models::{distance_mpc, redshift_to_velocity};

/// Format the full run summary (dataset, model, fitted parameters).
pub fn format_run_summary(run: &RunOutput, config: &FitConfig) -> String {
    let mut out = String::new();
    let fit = &run.fit;

    out.push_str("=== hubble - Hubble constant estimate ===\n");
    out.push_str(&format!("Input: {}\n", describe_input(&config.input)));
    if let Some(stats) = DatasetStats::from_observations(&run.observations) {
        out.push_str(&format!(
            "Points: n={} | z=[{:.5}, {:.5}] | m=[{:.2}, {:.2}]\n",
            stats.n_points, stats.redshift_min, stats.redshift_max, stats.apparent_min, stats.apparent_max
        ));
    }
    out.push_str(&format!("Model: {}\n", run.model.display_name()));
    out.push_str(&format!("Velocity: {}\n", velocity_label(config.velocity)));

    out.push('\n');
    // H0 is only searched by the magnitude models; elsewhere it is a regression slope.
    let h0_note = if run.model.is_magnitude_model() {
        bound_note(config, PARAM_H0, fit.h0)
    } else {
        String::new()
    };
    out.push_str(&format!(
        "H0 = {} ± {} km/s-Mpc{h0_note}\n",
        fmt_num(fit.h0),
        fmt_num(fit.std_err)
    ));
    for (name, value) in &fit.extra_params {
        let err = fit.extra_errors.get(name).copied().unwrap_or(f64::NAN);
        let note = bound_note(config, name, *value);
        out.push_str(&format!("{name} = {} ± {}{note}\n", fmt_num(*value), fmt_num(err)));
    }

    if let Some(hubble) = &run.hubble {
        out.push_str(&format_regression(hubble));
    }
    out.push_str(&format!("SSE: {:.6e} (n={})\n", fit.sse, fit.n));
    if !fit.converged {
        out.push_str(&format!(
            "WARNING: optimizer did not converge within {} iterations; values are the best point found.\n",
            fit.iterations
        ));
    }

    out
}

/// `"  [at lower bound of [0, 0.1]]"` when a searched parameter ended on a face of its box.
fn bound_note(config: &FitConfig, name: &str, value: f64) -> String {
    let Some(spec) = config.params.iter().find(|p| p.name == name) else {
        return String::new();
    };
    if spec.is_fixed() || !value.is_finite() {
        return String::new();
    }
    let tol = 1e-9 * (spec.upper - spec.lower);
    let face = if value <= spec.lower + tol {
        "lower"
    } else if value >= spec.upper - tol {
        "upper"
    } else {
        return String::new();
    };
    format!("  [at {face} bound of [{}, {}]]", spec.lower, spec.upper)
}

fn format_regression(fit: &LinearFit) -> String {
    format!(
        "Regression: intercept={} ± {} | r={:.6} | p={:.3e}\n",
        fmt_num(fit.intercept),
        fmt_num(fit.intercept_std_err),
        fit.r_value,
        fit.p_value
    )
}

/// Per-row table of the inputs and the quantities derived from them.
pub fn format_observation_table(observations: &[Observation]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>4} {:>10} {:>10} {:>10} {:>12} {:>14} {:>14}",
            "row", "m", "M", "z", "D (Mpc)", "v_cl (km/s)", "v_rel (km/s)"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<4} {:-<10} {:-<10} {:-<10} {:-<12} {:-<14} {:-<14}\n",
        "", "", "", "", "", "", ""
    ));

    for (row, o) in observations.iter().enumerate() {
        let d = distance_mpc(o.apparent_magnitude, o.absolute_magnitude);
        let v_cl = redshift_to_velocity(o.redshift, VelocityFormula::Classical).ok();
        let v_rel = redshift_to_velocity(o.redshift, VelocityFormula::Relativistic).ok();
        out.push_str(&format!(
            "{row:>4} {:>10.4} {:>10.4} {:>10.6} {:>12} {:>14} {:>14}\n",
            o.apparent_magnitude,
            o.absolute_magnitude,
            o.redshift,
            fmt_num(d),
            v_cl.map(fmt_num).unwrap_or_else(|| "n/a".to_string()),
            v_rel.map(fmt_num).unwrap_or_else(|| "n/a".to_string()),
        ));
    }

    out
}

/// Pretty-print a saved result file.
pub fn format_result_file(result: &ResultFile) -> String {
    let mut out = String::new();
    if let Some(model) = &result.model {
        out.push_str(&format!("Model: {model}\n"));
    }
    let err = result.h0_std_err.map(fmt_num).unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!("H0 = {} ± {err} km/s-Mpc\n", fmt_num(result.h0)));
    for (name, value) in &result.extra {
        out.push_str(&format!("{name} = {}\n", fmt_num(*value)));
    }
    if !result.converged {
        out.push_str("WARNING: the saved fit did not converge.\n");
    }
    out
}

fn describe_input(input: &InputSource) -> String {
    match input {
        InputSource::File(path) => path.display().to_string(),
        InputSource::Builtin => "built-in sample".to_string(),
    }
}

fn velocity_label(formula: VelocityFormula) -> &'static str {
    match formula {
        VelocityFormula::Classical => "classical (v = cz)",
        VelocityFormula::Relativistic => "relativistic Doppler",
    }
}

fn fmt_num(v: f64) -> String {
    if v.is_finite() { format!("{v:.4}") } else { "n/a".to_string() }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{ExtinctionModel, FitResult, PARAM_E_BV, PARAM_K};

    fn run_output(converged: bool) -> RunOutput {
        let observations = vec![Observation::new(15.0, -19.0, 0.01), Observation::new(16.0, -19.0, 0.02)];
        RunOutput {
            distances: vec![63.0, 100.0],
            velocities: vec![2997.9, 5995.8],
            fit: FitResult {
                h0: 69.5,
                std_err: 1.25,
                extra_params: BTreeMap::from([(PARAM_E_BV.to_string(), 0.2)]),
                extra_errors: BTreeMap::from([(PARAM_E_BV.to_string(), f64::NAN)]),
                converged,
                iterations: 17,
                sse: 0.01,
                n: 2,
            },
            hubble: None,
            model: ExtinctionModel::ColorExcess { r_v: Some(3.1) },
            observations,
        }
    }

    #[test]
    fn summary_shows_h0_and_extras() {
        let run = run_output(true);
        let config = FitConfig::for_model(InputSource::Builtin, run.model, VelocityFormula::Classical);
        let text = format_run_summary(&run, &config);

        assert!(text.contains("H0 = 69.5000 ± 1.2500 km/s-Mpc"), "{text}");
        assert!(text.contains("E(B-V) = 0.2000 ± n/a"), "{text}");
        assert!(text.contains("built-in sample"));
        assert!(!text.contains("WARNING"));
    }

    #[test]
    fn summary_flags_non_convergence() {
        let run = run_output(false);
        let config = FitConfig::for_model(InputSource::Builtin, run.model, VelocityFormula::Classical);
        assert!(format_run_summary(&run, &config).contains("did not converge within 17 iterations"));
    }

    #[test]
    fn summary_marks_parameters_on_a_search_bound() {
        let mut run = run_output(true);
        run.model = ExtinctionModel::LinearDistance;
        run.fit.extra_params = BTreeMap::from([(PARAM_K.to_string(), 0.0)]);
        run.fit.extra_errors = BTreeMap::from([(PARAM_K.to_string(), 0.0)]);
        let config = FitConfig::for_model(InputSource::Builtin, run.model, VelocityFormula::Classical);

        let text = format_run_summary(&run, &config);
        assert!(
            text.contains("Extinction coefficient (k) = 0.0000 ± 0.0000  [at lower bound of [0, 0.1]]"),
            "{text}"
        );
        assert!(!text.contains("H0 = 69.5000 ± 1.2500 km/s-Mpc  ["), "{text}");

        run.fit.extra_params.insert(PARAM_K.to_string(), 0.05);
        assert!(!format_run_summary(&run, &config).contains("bound of"));
    }

    #[test]
    fn summary_marks_h0_on_a_bound_for_magnitude_models() {
        let mut run = run_output(true);
        run.fit.h0 = 100.0;
        let config = FitConfig::for_model(InputSource::Builtin, run.model, VelocityFormula::Classical);
        let text = format_run_summary(&run, &config);
        assert!(text.contains("H0 = 100.0000 ± 1.2500 km/s-Mpc  [at upper bound of [0, 100]]"), "{text}");
        // R_V is held fixed and E(B-V) = 0.2 is interior.
        assert_eq!(text.matches("bound of").count(), 1);
    }

    #[test]
    fn observation_table_marks_invalid_relativistic_velocity() {
        let text = format_observation_table(&[Observation::new(15.0, -20.0, -1.0)]);
        let row = text.lines().nth(2).unwrap();
        // m - M = 35 -> 100 Mpc
        assert!(row.contains("100.0000"), "{row}");
        assert!(row.trim_end().ends_with("n/a"), "{row}");
    }

    #[test]
    fn result_file_lists_extras() {
        let result = ResultFile {
            h0: 70.0,
            h0_std_err: None,
            model: None,
            converged: true,
            extra: BTreeMap::from([("Extinction coefficient (k)".to_string(), 0.002)]),
        };
        let text = format_result_file(&result);
        assert!(text.contains("H0 = 70.0000 ± n/a km/s-Mpc"));
        assert!(text.contains("Extinction coefficient (k) = 0.0020"));
    }
}
