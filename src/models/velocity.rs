//! Recession velocity from redshift.

use crate::domain::{SPEED_OF_LIGHT_KMS, VelocityFormula};
use crate::error::{EstimateError, EstimateResult};

/// Velocity in km/s for redshift `z`.
///
/// - classical: `v = c·z`
/// - relativistic Doppler: `v = c·((1+z)² - 1)/((1+z)² + 1)`, defined for `z > -1`
pub fn redshift_to_velocity(z: f64, formula: VelocityFormula) -> EstimateResult<f64> {
    if !z.is_finite() {
        return Err(EstimateError::Domain(format!("redshift must be finite, got {z}")));
    }
    match formula {
        VelocityFormula::Classical => Ok(SPEED_OF_LIGHT_KMS * z),
        VelocityFormula::Relativistic => {
            if z <= -1.0 {
                return Err(EstimateError::Domain(format!(
                    "relativistic velocity needs z > -1, got {z}"
                )));
            }
            let s = (1.0 + z) * (1.0 + z);
            Ok(SPEED_OF_LIGHT_KMS * (s - 1.0) / (s + 1.0))
        }
    }
}

/// [`redshift_to_velocity`] for every redshift, naming the offending row on error.
pub fn redshifts_to_velocities(redshifts: &[f64], formula: VelocityFormula) -> EstimateResult<Vec<f64>> {
    redshifts
        .iter()
        .enumerate()
        .map(|(row, &z)| {
            redshift_to_velocity(z, formula).map_err(|e| match e {
                EstimateError::Domain(msg) => EstimateError::domain_at("Redshift (z)", row, msg),
                other => other,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classical_is_c_times_z() {
        for &z in &[0.0, 0.003_675_966_973_834_654_5, 0.036, 1.5, -0.2, -3.0] {
            let v = redshift_to_velocity(z, VelocityFormula::Classical).unwrap();
            assert_eq!(v, SPEED_OF_LIGHT_KMS * z);
        }
    }

    #[test]
    fn relativistic_is_below_c_and_close_to_classical_for_small_z() {
        let z = 0.01;
        let rel = redshift_to_velocity(z, VelocityFormula::Relativistic).unwrap();
        let cls = redshift_to_velocity(z, VelocityFormula::Classical).unwrap();
        assert!((rel - cls).abs() / cls < 0.01);
        assert!(rel < cls);

        let fast = redshift_to_velocity(5.0, VelocityFormula::Relativistic).unwrap();
        assert!(fast < SPEED_OF_LIGHT_KMS);
        // (1+5)² = 36 -> c·35/37
        assert!((fast - SPEED_OF_LIGHT_KMS * 35.0 / 37.0).abs() < 1e-9);
    }

    #[test]
    fn relativistic_rejects_z_at_or_below_minus_one() {
        for &z in &[-1.0, -1.5] {
            let err = redshift_to_velocity(z, VelocityFormula::Relativistic).unwrap_err();
            assert!(matches!(err, EstimateError::Domain(_)), "{err:?}");
        }
        assert!(redshift_to_velocity(-0.999, VelocityFormula::Relativistic).is_ok());
    }

    #[test]
    fn array_errors_carry_row_index() {
        let err = redshifts_to_velocities(&[0.01, 0.02, -1.0], VelocityFormula::Relativistic).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Redshift (z)") && msg.contains("row 2"), "{msg}");
    }
}
