//! Photometric distances and the iterative extinction correction.
//!
//! The distance modulus `m - M = 5·log10(D_pc) - 5` gives, in megaparsecs,
//!
//! ```text
//! D = 10^((m - M + 5)/5) / 1e6
//! ```
//!
//! With linear-in-distance extinction `A_V = k·D` the observed magnitude is
//! dimmed by an amount that itself depends on `D`, so the distance is refined
//! by fixed-point iteration: `A_V = k·D`, `m' = m - A_V`, recompute `D` from
//! `m'`. Each step starts from the *observed* `m`, not from the previous `m'`.

use rayon::prelude::*;

use crate::domain::{Backend, IterationSchedule, Observation};
use crate::error::{EstimateError, EstimateResult};

/// Closed-form distance in Mpc from apparent and absolute magnitude.
pub fn distance_mpc(apparent_magnitude: f64, absolute_magnitude: f64) -> f64 {
    10f64.powf((apparent_magnitude - absolute_magnitude + 5.0) / 5.0) / 1e6
}

/// Extinction-corrected distance in Mpc for `A_V = k·D`.
///
/// With `k = 0` this returns exactly [`distance_mpc`], whatever the schedule.
pub fn correct_distance(
    apparent_magnitude: f64,
    absolute_magnitude: f64,
    extinction_coefficient: f64,
    schedule: IterationSchedule,
) -> EstimateResult<f64> {
    if !(apparent_magnitude.is_finite() && absolute_magnitude.is_finite()) {
        return Err(EstimateError::Domain(format!(
            "magnitudes must be finite (m={apparent_magnitude}, M={absolute_magnitude})"
        )));
    }
    if !extinction_coefficient.is_finite() {
        return Err(EstimateError::Domain(format!(
            "extinction coefficient must be finite, got {extinction_coefficient}"
        )));
    }

    let mut d = distance_mpc(apparent_magnitude, absolute_magnitude);
    ensure_positive(d)?;

    let step = |d: f64| {
        let a_v = extinction_coefficient * d;
        distance_mpc(apparent_magnitude - a_v, absolute_magnitude)
    };

    match schedule {
        IterationSchedule::Fixed(iterations) => {
            for _ in 0..iterations {
                d = step(d);
                ensure_positive(d)?;
            }
        }
        IterationSchedule::Tolerance {
            rel_tol,
            max_iterations,
        } => {
            for _ in 0..max_iterations {
                let next = step(d);
                ensure_positive(next)?;
                let done = (next - d).abs() <= rel_tol * d;
                d = next;
                if done {
                    break;
                }
            }
        }
    }

    Ok(d)
}

fn ensure_positive(d: f64) -> EstimateResult<()> {
    if d.is_finite() && d > 0.0 {
        Ok(())
    } else {
        Err(EstimateError::Domain(format!(
            "distance must be finite and positive, got {d} Mpc"
        )))
    }
}

/// [`correct_distance`] for every observation.
///
/// Errors name the first offending row (0-based), regardless of backend.
pub fn correct_distances(
    observations: &[Observation],
    extinction_coefficient: f64,
    schedule: IterationSchedule,
    backend: Backend,
) -> EstimateResult<Vec<f64>> {
    let one = |o: &Observation| {
        correct_distance(
            o.apparent_magnitude,
            o.absolute_magnitude,
            extinction_coefficient,
            schedule,
        )
    };

    let results: Vec<EstimateResult<f64>> = match backend {
        Backend::Serial => observations.iter().map(one).collect(),
        Backend::Parallel => observations.par_iter().map(one).collect(),
    };

    collect_rows(results)
}

/// Distance in Mpc that satisfies `m = M + 5·log10(D) + 25 + k·D` exactly.
///
/// This is the limit the iteration of [`correct_distance`] aims for, but the
/// iteration only contracts while `k·D·ln(10)/5 < 1`. For `k >= 0` the right
/// side is strictly increasing in `D`, so the root is unique and lies in
/// `log10(D0) - k·D0/5 <= log10(D) <= log10(D0)`, with `D0` the uncorrected
/// distance. In `x = log10(D)` the residual is convex, so Newton steps from
/// the upper end decrease monotonically onto the root.
pub fn solve_distance(
    apparent_magnitude: f64,
    absolute_magnitude: f64,
    extinction_coefficient: f64,
) -> EstimateResult<f64> {
    if !(apparent_magnitude.is_finite() && absolute_magnitude.is_finite()) {
        return Err(EstimateError::Domain(format!(
            "magnitudes must be finite (m={apparent_magnitude}, M={absolute_magnitude})"
        )));
    }
    let k = extinction_coefficient;
    if !(k.is_finite() && k >= 0.0) {
        return Err(EstimateError::Domain(format!(
            "extinction coefficient must be finite and non-negative to solve for distance, got {k}"
        )));
    }

    let d0 = distance_mpc(apparent_magnitude, absolute_magnitude);
    ensure_positive(d0)?;
    if k == 0.0 {
        return Ok(d0);
    }

    let upper = d0.log10();
    let lower = upper - k * d0 / 5.0;
    let mut x = upper;
    for _ in 0..MAX_NEWTON_STEPS {
        let d = 10f64.powf(x);
        let value = 5.0 * (x - upper) + k * d;
        let slope = 5.0 + k * std::f64::consts::LN_10 * d;
        let next = (x - value / slope).clamp(lower, upper);
        let done = (next - x).abs() <= 4.0 * f64::EPSILON * next.abs().max(1.0);
        x = next;
        if done {
            break;
        }
    }

    let d = 10f64.powf(x);
    ensure_positive(d)?;
    Ok(d)
}

const MAX_NEWTON_STEPS: usize = 200;

/// [`solve_distance`] for every observation.
pub fn solve_distances(
    observations: &[Observation],
    extinction_coefficient: f64,
    backend: Backend,
) -> EstimateResult<Vec<f64>> {
    let one = |o: &Observation| solve_distance(o.apparent_magnitude, o.absolute_magnitude, extinction_coefficient);

    let results: Vec<EstimateResult<f64>> = match backend {
        Backend::Serial => observations.iter().map(one).collect(),
        Backend::Parallel => observations.par_iter().map(one).collect(),
    };

    collect_rows(results)
}

/// Distances after removing a fixed extinction `a_v` from every apparent magnitude.
pub fn distances_with_extinction(observations: &[Observation], a_v: f64) -> EstimateResult<Vec<f64>> {
    let results = observations
        .iter()
        .map(|o| {
            let d = distance_mpc(o.apparent_magnitude - a_v, o.absolute_magnitude);
            ensure_positive(d).map(|_| d)
        })
        .collect();
    collect_rows(results)
}

fn collect_rows(results: Vec<EstimateResult<f64>>) -> EstimateResult<Vec<f64>> {
    let mut out = Vec::with_capacity(results.len());
    for (row, r) in results.into_iter().enumerate() {
        match r {
            Ok(d) => out.push(d),
            Err(EstimateError::Domain(msg)) => {
                return Err(EstimateError::domain_at("distance", row, msg));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}
