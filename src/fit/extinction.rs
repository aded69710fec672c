//! Linear-in-distance extinction: search for `k` in `A_V = k·D`.
//!
//! For a candidate `k` we correct every distance iteratively, regress velocity
//! on the corrected distances, and score the candidate by how well the
//! proportional law `v = H0·D` explains the velocities:
//!
//! ```text
//! SSE(k) = Σ (v_i - H0(k)·D_i(k))²
//! ```
//!
//! The best `k` then feeds one final Hubble-law regression, which provides the
//! reported `H0` and its standard error.

use std::collections::BTreeMap;

use crate::domain::{Backend, FitResult, IterationSchedule, LinearFit, Observation, ParamSpec, VelocityFormula};
use crate::error::{EstimateError, EstimateResult};
use crate::fit::fitter::{NonlinearOptions, UnitBox};
use crate::fit::hubble::fit_hubble_law;
use crate::math::{minimize_in_unit_box, numerical_jacobian, polish_in_unit_box, simple_regression, sum_of_squares};
use crate::models::{correct_distances, redshifts_to_velocities};

/// Result of the `k` search: the summary plus the regression and distances
/// it was computed from.
#[derive(Debug, Clone)]
pub struct ExtinctionFit {
    pub result: FitResult,
    pub hubble: LinearFit,
    pub distances: Vec<f64>,
    pub velocities: Vec<f64>,
}

/// Fit the extinction coefficient `k` (single parameter spec, e.g. `[0, 0.1]`).
pub fn fit_extinction_coefficient(
    observations: &[Observation],
    velocity: VelocityFormula,
    schedule: IterationSchedule,
    backend: Backend,
    k_spec: &ParamSpec,
    opts: &NonlinearOptions,
) -> EstimateResult<ExtinctionFit> {
    let n = observations.len();
    if n < 2 {
        return Err(EstimateError::InsufficientData { needed: 2, got: n });
    }
    let unit_box = UnitBox::new(std::slice::from_ref(k_spec))?;

    let redshifts: Vec<f64> = observations.iter().map(|o| o.redshift).collect();
    let velocities = redshifts_to_velocities(&redshifts, velocity)?;

    // Fail early (with a row index) if the data cannot even be corrected at k = 0.
    correct_distances(observations, 0.0, schedule, backend)?;

    let residuals = |u: &[f64]| -> Option<Vec<f64>> {
        let k = unit_box.to_params(u)[0];
        let d = correct_distances(observations, k, schedule, backend).ok()?;
        let reg = simple_regression(&d, &velocities)?;
        let r: Vec<f64> = velocities.iter().zip(&d).map(|(v, di)| v - reg.slope * di).collect();
        r.iter().all(|x| x.is_finite()).then_some(r)
    };
    let objective = |u: &[f64]| residuals(u).map(|r| sum_of_squares(&r)).unwrap_or(f64::INFINITY);

    let report = minimize_in_unit_box(objective, &unit_box.start(), &opts.simplex);
    let polished = opts
        .polish
        .filter(|_| report.f.is_finite())
        .map(|polish| polish_in_unit_box(&residuals, &report.x, &polish));
    let (u_best, sse, converged, iterations) = match polished {
        Some(p) => (p.x, p.sse, report.converged && p.converged, report.iterations + p.evaluations),
        None => (report.x.clone(), report.f, report.converged, report.iterations),
    };
    if !sse.is_finite() {
        return Err(EstimateError::Domain(
            "no extinction coefficient in the search box gives finite distances".to_string(),
        ));
    }

    let k = unit_box.to_params(&u_best)[0];
    let k_err = if unit_box.free_len() > 0 {
        // Degrees of freedom: k plus the implicit H0.
        unit_box.std_errors(numerical_jacobian(&residuals, &u_best), sse, n.saturating_sub(1))[0]
    } else {
        0.0
    };
    log::debug!("extinction search: k={k:.6e} ± {k_err:.3e}, SSE={sse:.6e}");

    let distances = correct_distances(observations, k, schedule, backend)?;
    let hubble = fit_hubble_law(&distances, &velocities)?;

    let mut extra_params = BTreeMap::new();
    let mut extra_errors = BTreeMap::new();
    extra_params.insert(k_spec.name.clone(), k);
    extra_errors.insert(k_spec.name.clone(), k_err);

    Ok(ExtinctionFit {
        result: FitResult {
            h0: hubble.slope,
            std_err: hubble.std_err,
            extra_params,
            extra_errors,
            converged,
            iterations,
            sse,
            n,
        },
        hubble,
        distances,
        velocities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtinctionModel, PARAM_K};
    use crate::models::{distance_mpc, redshift_to_velocity};

    /// Observations whose corrected distances at `k_true` lie exactly on `v = H0·D`.
    fn exact_sample(h0: f64, k_true: f64) -> Vec<Observation> {
        (0..15)
            .map(|i| {
                let z = 0.005 + 0.002 * i as f64;
                let v = redshift_to_velocity(z, VelocityFormula::Classical).unwrap();
                let d = v / h0;
                let abs_m = -19.0 - 0.2 * (i % 4) as f64;
                // m = M + 5·log10(d) + 25 + k·d
                let m = abs_m + 5.0 * d.log10() + 25.0 + k_true * d;
                Observation::new(m, abs_m, z)
            })
            .collect()
    }

    #[test]
    fn zero_extinction_data_yields_k_near_zero() {
        let obs = exact_sample(70.0, 0.0);
        let spec = &ExtinctionModel::LinearDistance.default_params()[0];
        let fit = fit_extinction_coefficient(
            &obs,
            VelocityFormula::Classical,
            IterationSchedule::default(),
            Backend::Serial,
            spec,
            &NonlinearOptions::default(),
        )
        .unwrap();

        assert!(fit.result.extra_params[PARAM_K].abs() < 1e-8, "{:?}", fit.result.extra_params);
        assert!((fit.result.h0 - 70.0).abs() < 1e-6, "H0 = {}", fit.result.h0);
        assert_eq!(fit.distances.len(), obs.len());
    }

    #[test]
    fn converged_schedule_recovers_dust_coefficient() {
        let obs = exact_sample(70.0, 0.004);
        let spec = ParamSpec::new(PARAM_K, 0.0, 0.0, 0.1);
        let schedule = IterationSchedule::Tolerance {
            rel_tol: 1e-13,
            max_iterations: 1_000,
        };
        let fit = fit_extinction_coefficient(
            &obs,
            VelocityFormula::Classical,
            schedule,
            Backend::Parallel,
            &spec,
            &NonlinearOptions::default(),
        )
        .unwrap();

        let k = fit.result.extra_params[PARAM_K];
        assert!((k - 0.004).abs() < 1e-7, "k = {k}");
        assert!((fit.result.h0 - 70.0).abs() < 1e-3, "H0 = {}", fit.result.h0);
        // The corrected distances are below the raw photometric ones.
        let raw = distance_mpc(obs[14].apparent_magnitude, obs[14].absolute_magnitude);
        assert!(fit.distances[14] < raw);
    }

    #[test]
    fn too_few_rows_fail() {
        let obs = exact_sample(70.0, 0.0);
        let spec = ParamSpec::new(PARAM_K, 0.0, 0.0, 0.1);
        let err = fit_extinction_coefficient(
            &obs[..1],
            VelocityFormula::Classical,
            IterationSchedule::default(),
            Backend::Serial,
            &spec,
            &NonlinearOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EstimateError::InsufficientData { got: 1, .. }));
    }
}
