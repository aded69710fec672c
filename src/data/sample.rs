//! Built-in sample and seeded synthetic datasets.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Observation, VelocityFormula};
use crate::error::{EstimateError, EstimateResult};
use crate::models::redshift_to_velocity;

const BUILTIN_APPARENT: [f64; 19] = [
    14.541391237647325,
    16.756128786151876,
    15.829604890719585,
    16.29457480995023,
    13.829093893418786,
    14.182568722430029,
    16.03907734592769,
    17.138868011663146,
    15.998250803312972,
    17.910486867901746,
    15.074669722972802,
    15.164039588647865,
    12.484639187522449,
    15.60165860026537,
    13.753617662388354,
    14.50453086130131,
    14.147029911292748,
    16.04484713334022,
    15.192141049675008,
];

const BUILTIN_ABSOLUTE: [f64; 19] = [
    -16.339065057631082,
    -18.177729885179346,
    -16.696145000879945,
    -19.512265201224647,
    -19.665756128261307,
    -21.24923043094372,
    -17.778062621886992,
    -17.656338949942327,
    -19.397655426925155,
    -16.93192787486793,
    -20.918615711799312,
    -18.86686028127157,
    -23.32220082365243,
    -18.32499057478847,
    -21.310568461137503,
    -18.80925829710656,
    -18.51036467391853,
    -20.29101150867485,
    -16.313008928644898,
];

const BUILTIN_REDSHIFT: [f64; 19] = [
    0.0036759669738346545,
    0.02260424055745114,
    0.008037853020448127,
    0.036351715342596735,
    0.01039452291356091,
    0.03358661872848456,
    0.014447634338827342,
    0.017837996244636223,
    0.030485281173716405,
    0.025338258561158566,
    0.030141298549296147,
    0.017837996244636223,
    0.0325517381815954,
    0.011068888391776666,
    0.01715898899234225,
    0.01208129940826752,
    0.006022296587493203,
    0.03220702315577939,
    0.004010818525698623,
];

/// The 19-observation reference sample.
pub fn builtin_observations() -> Vec<Observation> {
    BUILTIN_APPARENT
        .iter()
        .zip(BUILTIN_ABSOLUTE.iter())
        .zip(BUILTIN_REDSHIFT.iter())
        .map(|((&m, &abs_m), &z)| Observation::new(m, abs_m, z))
        .collect()
}

/// Parameters of a synthetic dataset.
///
/// Observations are drawn as:
/// - `z ~ U[z_min, z_max]`, `M ~ U[abs_mag_min, abs_mag_max]`
/// - true distance `d = v(z)/H0`
/// - `m = M + 5·log10(d) + 25 + k·d + N(0, noise_sigma)`
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub count: usize,
    pub h0: f64,
    pub extinction_k: f64,
    pub noise_sigma: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub abs_mag_min: f64,
    pub abs_mag_max: f64,
    pub velocity: VelocityFormula,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            count: 19,
            h0: 70.0,
            extinction_k: 0.0,
            noise_sigma: 0.1,
            z_min: 0.003,
            z_max: 0.037,
            abs_mag_min: -23.5,
            abs_mag_max: -16.0,
            velocity: VelocityFormula::Classical,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> EstimateResult<()> {
        let bad = |msg: String| Err(EstimateError::InvalidConfig(msg));
        if self.count == 0 {
            return bad("sample count must be > 0".to_string());
        }
        if !(self.h0.is_finite() && self.h0 > 0.0) {
            return bad(format!("H0 must be positive, got {}", self.h0));
        }
        if !(self.extinction_k.is_finite() && self.extinction_k >= 0.0) {
            return bad(format!("extinction coefficient must be >= 0, got {}", self.extinction_k));
        }
        if !(self.noise_sigma.is_finite() && self.noise_sigma >= 0.0) {
            return bad(format!("noise sigma must be >= 0, got {}", self.noise_sigma));
        }
        if !(self.z_min.is_finite() && self.z_max.is_finite() && self.z_min > 0.0 && self.z_max >= self.z_min) {
            return bad(format!("invalid redshift range [{}, {}]", self.z_min, self.z_max));
        }
        if !(self.abs_mag_min.is_finite() && self.abs_mag_max.is_finite() && self.abs_mag_max >= self.abs_mag_min) {
            return bad(format!(
                "invalid absolute magnitude range [{}, {}]",
                self.abs_mag_min, self.abs_mag_max
            ));
        }
        Ok(())
    }
}

/// Draw a reproducible synthetic dataset.
pub fn generate_observations(config: &SimulationConfig) -> EstimateResult<Vec<Observation>> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise_sigma)
        .map_err(|e| EstimateError::InvalidConfig(format!("noise distribution: {e}")))?;

    (0..config.count)
        .map(|_| {
            let z = rng.gen_range(config.z_min..=config.z_max);
            let abs_m = rng.gen_range(config.abs_mag_min..=config.abs_mag_max);
            let d = redshift_to_velocity(z, config.velocity)? / config.h0;
            let m = abs_m + 5.0 * d.log10() + 25.0 + config.extinction_k * d + noise.sample(&mut rng);
            Ok(Observation::new(m, abs_m, z))
        })
        .collect()
}
