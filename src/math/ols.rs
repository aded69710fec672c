//! Regression statistics and parameter covariances.
//!
//! Two kinds of problems show up in this project:
//!
//! - simple linear regression of velocity on distance (Hubble diagram), with
//!   the usual statistics (standard errors, correlation, p-value)
//! - parameter covariances from the residual Jacobian of the magnitude models
//!
//! Implementation choices:
//! - Regression statistics use centered sums (population moments), the same
//!   conventions as common statistics packages, so results compare directly.
//! - Covariances use SVD so that rank-deficient Jacobians are detected rather
//!   than inverted.

use nalgebra::DMatrix;

use crate::math::student_t_sf;

const TINY: f64 = 1.0e-20;

/// Output of [`simple_regression`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleRegression {
    pub slope: f64,
    pub intercept: f64,
    pub slope_std_err: f64,
    pub intercept_std_err: f64,
    pub r_value: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Ordinary least squares fit of `y = intercept + slope·x`.
///
/// Returns `None` when fewer than two points are given, the slices differ in
/// length, or `x` has zero variance. Callers that need error messages should
/// check these conditions first.
///
/// With exactly two points the line is exact: the standard errors are `0` and
/// the p-value is `0` (or `1` when both `y` are equal).
pub fn simple_regression(x: &[f64], y: &[f64]) -> Option<SimpleRegression> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }

    let nf = n as f64;
    let x_mean = x.iter().sum::<f64>() / nf;
    let y_mean = y.iter().sum::<f64>() / nf;

    let mut ssxm = 0.0;
    let mut ssym = 0.0;
    let mut ssxym = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        ssxm += dx * dx;
        ssym += dy * dy;
        ssxym += dx * dy;
    }
    ssxm /= nf;
    ssym /= nf;
    ssxym /= nf;

    if ssxm <= 0.0 || !ssxm.is_finite() {
        return None;
    }

    let r_den = (ssxm * ssym).sqrt();
    let r_value = if r_den == 0.0 {
        0.0
    } else {
        (ssxym / r_den).clamp(-1.0, 1.0)
    };

    let slope = ssxym / ssxm;
    let intercept = y_mean - slope * x_mean;

    let (p_value, slope_std_err, intercept_std_err) = if n == 2 {
        let p = if y[0] == y[1] { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        let df = nf - 2.0;
        let t = r_value * (df / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
        let p = (2.0 * student_t_sf(t.abs(), df)).min(1.0);
        let se = ((1.0 - r_value * r_value) * ssym / ssxm / df).sqrt();
        (p, se, se * (ssxm + x_mean * x_mean).sqrt())
    };

    Some(SimpleRegression {
        slope,
        intercept,
        slope_std_err,
        intercept_std_err,
        r_value,
        p_value,
        n,
    })
}

/// Parameter covariance `s²·(JᵀJ)⁻¹` from a residual Jacobian.
///
/// Returns `None` when the Jacobian is rank deficient (relative singular value
/// below `1e-8`), i.e. the parameters are not separately identifiable.
pub fn covariance_from_jacobian(jacobian: &DMatrix<f64>, s2: f64) -> Option<DMatrix<f64>> {
    let p = jacobian.ncols();
    if p == 0 || jacobian.nrows() < p || !s2.is_finite() {
        return None;
    }

    let svd = jacobian.clone().svd(false, true);
    let v_t = svd.v_t?;
    let sigma = svd.singular_values;
    let sigma_max = sigma.iter().cloned().fold(0.0_f64, f64::max);
    if sigma_max <= 0.0 || sigma.iter().any(|s| !s.is_finite() || *s <= 1e-8 * sigma_max) {
        return None;
    }

    // JᵀJ = V Σ² Vᵀ  =>  (JᵀJ)⁻¹ = V Σ⁻² Vᵀ
    let mut inv_sigma2 = DMatrix::<f64>::zeros(p, p);
    for i in 0..p {
        inv_sigma2[(i, i)] = 1.0 / (sigma[i] * sigma[i]);
    }
    let v = v_t.transpose();
    Some(&v * inv_sigma2 * v_t * s2)
}
