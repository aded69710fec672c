//! Levenberg–Marquardt polish for residual problems on the unit box.
//!
//! The simplex search gets close to the minimum cheaply but converges only
//! linearly. `LevenbergMarquardt` recovers full precision from that point.
//! The solver works on unconstrained coordinates; every residual evaluation
//! clamps them to `[0, 1]` first, so it minimizes `r(clamp(u))`.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{DMatrix, DVector, Dyn, storage::Owned};

const JACOBIAN_STEP: f64 = 1e-6;

/// Tolerances of the polish.
#[derive(Debug, Clone, Copy)]
pub struct PolishOptions {
    /// Relative reduction of the sum of squares (also used as `xtol`).
    pub ftol: f64,
    /// Orthogonality between residuals and Jacobian columns.
    pub gtol: f64,
    /// Evaluation budget, in multiples of `(free parameters + 1)`.
    pub patience: usize,
}

impl Default for PolishOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-12,
            gtol: 1e-12,
            patience: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolishReport {
    /// Best point, inside the unit box.
    pub x: Vec<f64>,
    pub sse: f64,
    pub evaluations: usize,
    pub converged: bool,
}

struct UnitBoxProblem<'a, R> {
    residuals: &'a R,
    params: DVector<f64>,
}

impl<R> UnitBoxProblem<'_, R> {
    fn clamped(&self) -> Vec<f64> {
        self.params.iter().map(|u| u.clamp(0.0, 1.0)).collect()
    }
}

impl<R> LeastSquaresProblem<f64, Dyn, Dyn> for UnitBoxProblem<'_, R>
where
    R: Fn(&[f64]) -> Option<Vec<f64>>,
{
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        (self.residuals)(&self.clamped()).map(DVector::from_vec)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jac = numerical_jacobian(self.residuals, &self.clamped())?;
        // Clamping makes the residuals flat outside the box.
        for (j, u) in self.params.iter().enumerate() {
            if !(0.0..=1.0).contains(u) {
                jac.column_mut(j).fill(0.0);
            }
        }
        Some(jac)
    }
}

/// Polish `u0` with Levenberg–Marquardt.
///
/// The returned point never has a larger sum of squares than `u0`. With no
/// free coordinates there is nothing to do and the report is trivially
/// converged.
pub fn polish_in_unit_box<R>(residuals: &R, u0: &[f64], opts: &PolishOptions) -> PolishReport
where
    R: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let start: Vec<f64> = u0.iter().map(|u| u.clamp(0.0, 1.0)).collect();
    let start_sse = residuals(&start).map(|r| sum_of_squares(&r)).unwrap_or(f64::INFINITY);
    if start.is_empty() || !start_sse.is_finite() {
        return PolishReport {
            converged: start.is_empty() && start_sse.is_finite(),
            x: start,
            sse: start_sse,
            evaluations: 0,
        };
    }

    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.ftol)
        .with_gtol(opts.gtol)
        .with_patience(opts.patience.max(1));
    let problem = UnitBoxProblem {
        residuals,
        params: DVector::from_vec(start.clone()),
    };
    let (problem, report) = lm.minimize(problem);
    log::debug!(
        "levenberg-marquardt: {:?} after {} evaluations",
        report.termination,
        report.number_of_evaluations
    );

    let x = problem.clamped();
    let sse = residuals(&x).map(|r| sum_of_squares(&r)).unwrap_or(f64::INFINITY);
    if sse <= start_sse {
        PolishReport {
            x,
            sse,
            evaluations: report.number_of_evaluations,
            converged: report.termination.was_successful(),
        }
    } else {
        PolishReport {
            x: start,
            sse: start_sse,
            evaluations: report.number_of_evaluations,
            converged: false,
        }
    }
}

/// Numerical Jacobian of `residuals` at `u`.
///
/// Central differences where the box allows, one-sided at the faces.
/// Returns `None` if any residual is non-finite.
pub fn numerical_jacobian<R>(residuals: &R, u: &[f64]) -> Option<DMatrix<f64>>
where
    R: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let base = residuals(u)?;
    let m = base.len();
    let p = u.len();
    let mut jac = DMatrix::<f64>::zeros(m, p);

    let mut shifted = u.to_vec();
    for j in 0..p {
        let lo = (u[j] - JACOBIAN_STEP).max(0.0);
        let hi = (u[j] + JACOBIAN_STEP).min(1.0);
        let span = hi - lo;
        if span <= 0.0 {
            continue;
        }

        shifted[j] = hi;
        let r_hi = residuals(&shifted)?;
        shifted[j] = lo;
        let r_lo = residuals(&shifted)?;
        shifted[j] = u[j];

        for i in 0..m {
            let d = (r_hi[i] - r_lo[i]) / span;
            if !d.is_finite() {
                return None;
            }
            jac[(i, j)] = d;
        }
    }

    Some(jac)
}

pub fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}
