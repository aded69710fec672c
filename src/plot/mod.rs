//! Hubble-diagram plotting (distance vs velocity with the fitted line).
//!
//! - terminal rendering (`ascii`)
//! - SVG files via plotters (`svg`)

use crate::app::pipeline::RunOutput;

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;

/// Straight line `v = intercept + slope·D` drawn over the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitLine {
    pub slope: f64,
    pub intercept: f64,
}

impl FitLine {
    /// The regression line for models fit on the Hubble diagram, `v = H0·D`
    /// for models fit on magnitudes.
    pub fn from_run(run: &RunOutput) -> Self {
        match &run.hubble {
            Some(h) if !run.model.is_magnitude_model() => Self {
                slope: h.slope,
                intercept: h.intercept,
            },
            _ => Self {
                slope: run.fit.h0,
                intercept: 0.0,
            },
        }
    }

    pub fn at(&self, distance: f64) -> f64 {
        self.intercept + self.slope * distance
    }

    /// `n` evenly spaced points on `[x_min, x_max]`.
    pub fn sample(&self, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
        let n = n.max(2);
        (0..n)
            .map(|i| {
                let u = i as f64 / (n as f64 - 1.0);
                let x = x_min + u * (x_max - x_min);
                (x, self.at(x))
            })
            .collect()
    }
}

/// `(min, max)` of the finite values, `None` if there are none or they are all equal.
fn finite_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    (min.is_finite() && max.is_finite() && max > min).then_some((min, max))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}
