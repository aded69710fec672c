//! Apparent-magnitude models for the extinction variants.
//!
//! The non-linear fitter relies on one primitive: predict `m` for a given
//! velocity `v`, absolute magnitude `M` and parameter vector. Distances are in
//! Mpc, `d = v/H0`, so the distance modulus contributes `5·log10(d) + 25`.
//!
//! Parameter vectors follow `ExtinctionModel::default_params` order:
//!
//! | model | params |
//! | --- | --- |
//! | `None` | `[H0]` |
//! | `ColorExcess` | `[H0, R_V, E(B-V)]` |
//! | `Gamma` | `[H0, γ]` |
//! | `LinearDistance` | `[H0, k]` (same relation as `Gamma`) |

use crate::domain::ExtinctionModel;

/// Number of entries `predict_magnitude` expects for `model`.
pub fn param_len(model: &ExtinctionModel) -> usize {
    match model {
        ExtinctionModel::None => 1,
        ExtinctionModel::ColorExcess { .. } => 3,
        ExtinctionModel::Gamma | ExtinctionModel::LinearDistance => 2,
    }
}

/// Extinction `A_V` (magnitudes) for a given distance.
pub fn extinction(model: &ExtinctionModel, params: &[f64], distance_mpc: f64) -> f64 {
    match model {
        ExtinctionModel::None => 0.0,
        ExtinctionModel::ColorExcess { .. } => params[1] * params[2],
        ExtinctionModel::Gamma | ExtinctionModel::LinearDistance => params[1] * distance_mpc,
    }
}

/// Predict the apparent magnitude.
///
/// Returns a non-finite value when `v/H0` is not positive; callers treat that
/// as a rejected parameter point.
///
/// # Panics
/// Panics if `params` is shorter than `param_len(model)`.
pub fn predict_magnitude(model: &ExtinctionModel, params: &[f64], velocity: f64, absolute_magnitude: f64) -> f64 {
    let h0 = params[0];
    let d = velocity / h0;
    if !(d.is_finite() && d > 0.0) {
        return f64::NAN;
    }
    absolute_magnitude + 5.0 * d.log10() + 25.0 + extinction(model, params, d)
}
