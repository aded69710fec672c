//! Non-linear least squares on apparent magnitudes.
//!
//! Given:
//! - observations `(m_i, M_i, z_i)`
//! - an extinction model and a velocity formula
//! - a box-bounded parameter vector (`H0` first)
//!
//! we minimize `Σ (m_i - m_model(params; v_i, M_i))²`.
//!
//! Search strategy:
//! - free parameters are mapped to the unit box so all directions have
//!   comparable scale; fixed parameters (`lower == upper`) are held out
//! - bounded Nelder–Mead finds the basin without derivatives
//! - Levenberg–Marquardt polishes the simplex result
//!
//! Running out of simplex iterations is not an error: the best point is
//! returned with `converged = false`. The flag also drops when the polish
//! terminates unsuccessfully.

use std::collections::BTreeMap;

use crate::domain::{ExtinctionModel, FitResult, Observation, ParamSpec, VelocityFormula};
use crate::error::{EstimateError, EstimateResult};
use crate::math::{
    PolishOptions, SimplexOptions, covariance_from_jacobian, minimize_in_unit_box, numerical_jacobian,
    polish_in_unit_box, sum_of_squares,
};
use crate::models::{param_len, predict_magnitude, redshifts_to_velocities};

/// Knobs for the non-linear search.
#[derive(Debug, Clone, Copy)]
pub struct NonlinearOptions {
    pub simplex: SimplexOptions,
    /// Levenberg–Marquardt polish after the simplex (`None` disables it).
    pub polish: Option<PolishOptions>,
}

impl Default for NonlinearOptions {
    fn default() -> Self {
        Self {
            simplex: SimplexOptions::default(),
            polish: Some(PolishOptions::default()),
        }
    }
}

impl NonlinearOptions {
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            simplex: SimplexOptions {
                max_iterations,
                ..SimplexOptions::default()
            },
            ..Self::default()
        }
    }
}

/// Maps free parameters between the unit box and parameter space.
#[derive(Debug, Clone)]
pub(crate) struct UnitBox {
    specs: Vec<ParamSpec>,
    free: Vec<usize>,
}

impl UnitBox {
    pub(crate) fn new(specs: &[ParamSpec]) -> EstimateResult<Self> {
        for spec in specs {
            spec.validate()?;
        }
        let free = specs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_fixed())
            .map(|(i, _)| i)
            .collect();
        Ok(Self {
            specs: specs.to_vec(),
            free,
        })
    }

    pub(crate) fn free_len(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn start(&self) -> Vec<f64> {
        self.free
            .iter()
            .map(|&i| {
                let s = &self.specs[i];
                ((s.initial - s.lower) / (s.upper - s.lower)).clamp(0.0, 1.0)
            })
            .collect()
    }

    /// Full parameter vector for a unit-box point (fixed parameters filled in).
    pub(crate) fn to_params(&self, u: &[f64]) -> Vec<f64> {
        let mut x: Vec<f64> = self.specs.iter().map(|s| s.initial.clamp(s.lower, s.upper)).collect();
        for (&i, &ui) in self.free.iter().zip(u) {
            let s = &self.specs[i];
            x[i] = s.lower + ui.clamp(0.0, 1.0) * (s.upper - s.lower);
        }
        x
    }

    /// Standard errors in parameter space from a unit-box Jacobian.
    ///
    /// Fixed parameters get `0`; everything is `NaN` when the covariance is
    /// unavailable (rank-deficient Jacobian or no residual degrees of freedom).
    pub(crate) fn std_errors(&self, jac_u: Option<nalgebra::DMatrix<f64>>, sse: f64, n: usize) -> Vec<f64> {
        let mut errs: Vec<f64> = self
            .specs
            .iter()
            .map(|s| if s.is_fixed() { 0.0 } else { f64::NAN })
            .collect();

        let p = self.free.len();
        let Some(mut jac) = jac_u else { return errs };
        if p == 0 || n <= p {
            return errs;
        }

        for (col, &i) in self.free.iter().enumerate() {
            let width = self.specs[i].upper - self.specs[i].lower;
            jac.column_mut(col).scale_mut(1.0 / width);
        }
        let s2 = sse / (n - p) as f64;
        if let Some(cov) = covariance_from_jacobian(&jac, s2) {
            for (col, &i) in self.free.iter().enumerate() {
                errs[i] = cov[(col, col)].max(0.0).sqrt();
            }
        }
        errs
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }
}

/// Fit `model` to the observed apparent magnitudes.
///
/// `params` must follow `ExtinctionModel::default_params` order for the model
/// (H0 first). Returns the best point with per-parameter standard errors.
pub fn fit_nonlinear_model(
    observations: &[Observation],
    model: &ExtinctionModel,
    params: &[ParamSpec],
    velocity: VelocityFormula,
    opts: &NonlinearOptions,
) -> EstimateResult<FitResult> {
    let n = observations.len();
    if n < 2 {
        return Err(EstimateError::InsufficientData { needed: 2, got: n });
    }
    if params.len() != param_len(model) {
        return Err(EstimateError::InvalidConfig(format!(
            "{} expects {} parameters, got {}",
            model.display_name(),
            param_len(model),
            params.len()
        )));
    }
    let unit_box = UnitBox::new(params)?;

    let redshifts: Vec<f64> = observations.iter().map(|o| o.redshift).collect();
    let velocities = redshifts_to_velocities(&redshifts, velocity)?;
    if let Some(row) = velocities.iter().position(|&v| v <= 0.0) {
        return Err(EstimateError::domain_at(
            "Redshift (z)",
            row,
            "velocity must be positive for the log-distance model",
        ));
    }

    let residuals = |u: &[f64]| -> Option<Vec<f64>> {
        let x = unit_box.to_params(u);
        let mut r = Vec::with_capacity(n);
        for (o, &v) in observations.iter().zip(&velocities) {
            let m_fit = predict_magnitude(model, &x, v, o.absolute_magnitude);
            let ri = o.apparent_magnitude - m_fit;
            if !ri.is_finite() {
                return None;
            }
            r.push(ri);
        }
        Some(r)
    };
    let objective = |u: &[f64]| residuals(u).map(|r| sum_of_squares(&r)).unwrap_or(f64::INFINITY);

    let report = minimize_in_unit_box(objective, &unit_box.start(), &opts.simplex);
    log::debug!(
        "simplex: f={:.6e} after {} iterations (converged={})",
        report.f,
        report.iterations,
        report.converged
    );

    let polished = opts
        .polish
        .filter(|_| report.f.is_finite())
        .map(|polish| polish_in_unit_box(&residuals, &report.x, &polish));
    let (u_best, sse, converged, iterations) = match polished {
        Some(p) => (p.x, p.sse, report.converged && p.converged, report.iterations + p.evaluations),
        None => (report.x.clone(), report.f, report.converged, report.iterations),
    };

    if !sse.is_finite() {
        return Err(EstimateError::Domain(format!(
            "{} cannot be evaluated anywhere the search visited; check parameter bounds",
            model.display_name()
        )));
    }

    let x = unit_box.to_params(&u_best);
    let jac = if unit_box.free_len() > 0 {
        numerical_jacobian(&residuals, &u_best)
    } else {
        None
    };
    let errs = unit_box.std_errors(jac, sse, n);

    let mut extra_params = BTreeMap::new();
    let mut extra_errors = BTreeMap::new();
    for ((name, &value), &err) in unit_box.names().zip(&x).zip(&errs).skip(1) {
        extra_params.insert(name.to_string(), value);
        extra_errors.insert(name.to_string(), err);
    }

    Ok(FitResult {
        h0: x[0],
        std_err: errs[0],
        extra_params,
        extra_errors,
        converged,
        iterations,
        sse,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PARAM_E_BV, PARAM_GAMMA, PARAM_H0, PARAM_R_V};
    use crate::models::redshift_to_velocity;

    fn synthetic(model: &ExtinctionModel, truth: &[f64], formula: VelocityFormula) -> Vec<Observation> {
        (0..19)
            .map(|i| {
                let z = 0.004 + 0.0017 * i as f64;
                let abs_m = -16.5 - 0.35 * ((i * 7) % 19) as f64;
                let v = redshift_to_velocity(z, formula).unwrap();
                Observation::new(predict_magnitude(model, truth, v, abs_m), abs_m, z)
            })
            .collect()
    }

    fn rel(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn recovers_gamma_model_parameters() {
        let model = ExtinctionModel::Gamma;
        let obs = synthetic(&model, &[70.0, 0.01], VelocityFormula::Classical);
        let fit = fit_nonlinear_model(
            &obs,
            &model,
            &model.default_params(),
            VelocityFormula::Classical,
            &NonlinearOptions::default(),
        )
        .unwrap();

        assert!(rel(fit.h0, 70.0) < 1e-6, "H0 = {}", fit.h0);
        assert!(rel(fit.extra_params[PARAM_GAMMA], 0.01) < 1e-6, "{:?}", fit.extra_params);
        assert!(fit.sse < 1e-12);
        assert_eq!(fit.n, 19);
    }

    #[test]
    fn recovers_color_excess_with_h0_and_r_v_held_fixed() {
        let model = ExtinctionModel::ColorExcess { r_v: Some(3.1) };
        let obs = synthetic(&model, &[70.0, 3.1, 0.25], VelocityFormula::Relativistic);
        let params = vec![
            ParamSpec::fixed(PARAM_H0, 70.0),
            ParamSpec::fixed(PARAM_R_V, 3.1),
            ParamSpec::new(PARAM_E_BV, 0.1, 0.0, 3.0),
        ];
        let fit = fit_nonlinear_model(&obs, &model, &params, VelocityFormula::Relativistic, &NonlinearOptions::default())
            .unwrap();

        assert_eq!(fit.h0, 70.0);
        assert_eq!(fit.extra_params[PARAM_R_V], 3.1);
        assert!(rel(fit.extra_params[PARAM_E_BV], 0.25) < 1e-6, "{:?}", fit.extra_params);
        assert_eq!(fit.extra_errors[PARAM_R_V], 0.0);
    }

    #[test]
    fn free_color_excess_finds_the_degenerate_offset() {
        // Only -5·log10(H0) + R_V·E(B-V) is identifiable in this model.
        let model = ExtinctionModel::ColorExcess { r_v: None };
        let truth = [70.0, 3.1, 0.2];
        let obs = synthetic(&model, &truth, VelocityFormula::Classical);
        let fit = fit_nonlinear_model(
            &obs,
            &model,
            &model.default_params(),
            VelocityFormula::Classical,
            &NonlinearOptions::default(),
        )
        .unwrap();

        let offset = |h0: f64, r_v: f64, e: f64| -5.0 * h0.log10() + r_v * e;
        let got = offset(fit.h0, fit.extra_params[PARAM_R_V], fit.extra_params[PARAM_E_BV]);
        assert!((got - offset(truth[0], truth[1], truth[2])).abs() < 1e-6);
        assert!(fit.sse < 1e-10);
        assert!(fit.std_err.is_nan(), "degenerate parameters must not report an error bar");
    }

    #[test]
    fn exhausted_budget_is_reported_not_raised() {
        let model = ExtinctionModel::Gamma;
        let obs = synthetic(&model, &[70.0, 0.01], VelocityFormula::Classical);
        let opts = NonlinearOptions {
            simplex: SimplexOptions {
                max_iterations: 2,
                ..SimplexOptions::default()
            },
            polish: None,
        };
        let fit = fit_nonlinear_model(&obs, &model, &model.default_params(), VelocityFormula::Classical, &opts).unwrap();
        assert!(!fit.converged);
        assert!(fit.h0 >= 50.0 && fit.h0 <= 100.0);
    }

    #[test]
    fn rejects_short_data_and_wrong_parameter_count() {
        let model = ExtinctionModel::Gamma;
        let obs = synthetic(&model, &[70.0, 0.01], VelocityFormula::Classical);
        let err = fit_nonlinear_model(
            &obs[..1],
            &model,
            &model.default_params(),
            VelocityFormula::Classical,
            &NonlinearOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, EstimateError::InsufficientData { needed: 2, got: 1 });

        let err = fit_nonlinear_model(
            &obs,
            &model,
            &[ParamSpec::new(PARAM_H0, 70.0, 50.0, 100.0)],
            VelocityFormula::Classical,
            &NonlinearOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EstimateError::InvalidConfig(_)));
    }

    #[test]
    fn negative_velocity_is_a_domain_error() {
        let model = ExtinctionModel::None;
        let mut obs = synthetic(&ExtinctionModel::None, &[70.0], VelocityFormula::Classical);
        obs[3].redshift = -0.01;
        let err = fit_nonlinear_model(
            &obs,
            &model,
            &model.default_params(),
            VelocityFormula::Classical,
            &NonlinearOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 3"), "{err}");
    }
}
