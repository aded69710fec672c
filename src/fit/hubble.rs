//! Hubble-law regression: velocity on distance.

use crate::domain::LinearFit;
use crate::error::{EstimateError, EstimateResult};
use crate::math::{SimpleRegression, simple_regression};

impl From<SimpleRegression> for LinearFit {
    fn from(r: SimpleRegression) -> Self {
        LinearFit {
            slope: r.slope,
            intercept: r.intercept,
            std_err: r.slope_std_err,
            intercept_std_err: r.intercept_std_err,
            r_value: r.r_value,
            p_value: r.p_value,
            n: r.n,
        }
    }
}

/// Ordinary least squares fit of `v = H0·D + intercept`.
///
/// The slope is the Hubble constant in km/s/Mpc when distances are in Mpc and
/// velocities in km/s. Unpaired values count as missing data: mismatched
/// lengths fail like too few points.
pub fn fit_hubble_law(distances: &[f64], velocities: &[f64]) -> EstimateResult<LinearFit> {
    if distances.len() != velocities.len() {
        return Err(EstimateError::InsufficientData {
            needed: distances.len().max(velocities.len()).max(2),
            got: distances.len().min(velocities.len()),
        });
    }
    if distances.len() < 2 {
        return Err(EstimateError::InsufficientData {
            needed: 2,
            got: distances.len(),
        });
    }
    if let Some(row) = distances.iter().position(|d| !d.is_finite()) {
        return Err(EstimateError::domain_at("distance", row, "value is not finite"));
    }
    if let Some(row) = velocities.iter().position(|v| !v.is_finite()) {
        return Err(EstimateError::domain_at("velocity", row, "value is not finite"));
    }

    simple_regression(distances, velocities)
        .map(LinearFit::from)
        .ok_or_else(|| EstimateError::Domain("all distances are identical; slope is undefined".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_points_give_exact_hubble_constant() {
        let fit = fit_hubble_law(&[1.0, 2.0], &[100.0, 200.0]).unwrap();
        assert_eq!(fit.slope, 100.0);
        assert_eq!(fit.intercept, 0.0);
        assert_eq!(fit.std_err, 0.0);
        assert_eq!(fit.n, 2);
    }

    #[test]
    fn single_observation_is_insufficient() {
        let err = fit_hubble_law(&[1.0], &[70.0]).unwrap_err();
        assert_eq!(err, EstimateError::InsufficientData { needed: 2, got: 1 });
        assert!(matches!(
            fit_hubble_law(&[], &[]).unwrap_err(),
            EstimateError::InsufficientData { got: 0, .. }
        ));
    }

    #[test]
    fn noisy_line_has_positive_error_and_tiny_p_value() {
        let d: Vec<f64> = (1..=20).map(|i| 10.0 * i as f64).collect();
        let v: Vec<f64> = d
            .iter()
            .enumerate()
            .map(|(i, d)| 70.0 * d + if i % 2 == 0 { 150.0 } else { -150.0 })
            .collect();
        let fit = fit_hubble_law(&d, &v).unwrap();
        assert!((fit.slope - 70.0).abs() < 1.0, "slope = {}", fit.slope);
        assert!(fit.std_err > 0.0);
        assert!(fit.r_value > 0.99);
        assert!(fit.p_value < 1e-10);
    }

    #[test]
    fn mismatched_lengths_are_insufficient_and_flat_distances_are_domain_errors() {
        assert_eq!(
            fit_hubble_law(&[1.0, 2.0, 3.0], &[1.0]).unwrap_err(),
            EstimateError::InsufficientData { needed: 3, got: 1 }
        );
        assert!(matches!(
            fit_hubble_law(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            EstimateError::Domain(_)
        ));
        let err = fit_hubble_law(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
