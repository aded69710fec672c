//! Bounded Nelder–Mead simplex search.
//!
//! The search runs in **unit-box coordinates**: every free parameter is mapped
//! to `u ∈ [0, 1]` by the caller, so all directions have comparable scale and
//! box constraints reduce to clamping. Trial points are projected onto the box
//! before they are evaluated.
//!
//! Non-finite objective values are treated as `+∞` so that a model which is
//! undefined somewhere in the box (e.g. `log10(v/H0)` at `H0 = 0`) simply
//! repels the simplex.
//!
//! Termination requires both:
//! - the simplex diameter (max-norm) to drop below `x_tol`
//! - the objective spread across vertices to drop below `f_tol·(1 + |f_best|)`

/// Options for [`minimize_in_unit_box`].
#[derive(Debug, Clone, Copy)]
pub struct SimplexOptions {
    pub max_iterations: usize,
    pub x_tol: f64,
    pub f_tol: f64,
    /// Edge length of the initial simplex in unit coordinates.
    pub initial_step: f64,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            x_tol: 1e-10,
            f_tol: 1e-14,
            initial_step: 0.05,
        }
    }
}

/// Outcome of a simplex search.
#[derive(Debug, Clone)]
pub struct SimplexReport {
    pub x: Vec<f64>,
    pub f: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimize `f` over the unit box `[0, 1]^n` starting from `x0`.
///
/// `x0` is clamped into the box. With `n = 0` the objective is evaluated once
/// and reported as converged.
pub fn minimize_in_unit_box<F>(f: F, x0: &[f64], opts: &SimplexOptions) -> SimplexReport
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let start: Vec<f64> = x0.iter().map(|v| v.clamp(0.0, 1.0)).collect();
    if n == 0 {
        let f0 = eval(&start);
        return SimplexReport {
            x: start,
            f: f0,
            iterations: 0,
            converged: true,
        };
    }

    // Initial simplex: step along each axis, away from the nearer face.
    let mut vertices: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    vertices.push(start.clone());
    for i in 0..n {
        let mut v = start.clone();
        v[i] = if v[i] + opts.initial_step <= 1.0 {
            v[i] + opts.initial_step
        } else {
            v[i] - opts.initial_step
        };
        vertices.push(v);
    }
    let mut values: Vec<f64> = vertices.iter().map(|v| eval(v)).collect();

    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < opts.max_iterations {
        order_simplex(&mut vertices, &mut values);

        if has_converged(&vertices, &values, opts) {
            converged = true;
            break;
        }
        iterations += 1;

        let best = values[0];
        let worst = values[n];
        let second_worst = values[n - 1];
        let centroid = centroid_without_last(&vertices);

        let reflected = project(&centroid, &vertices[n], -REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < best {
            let expanded = project(&centroid, &vertices[n], -EXPAND);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                vertices[n] = expanded;
                values[n] = f_expanded;
            } else {
                vertices[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < second_worst {
            vertices[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        // Contraction: outside if the reflection improved on the worst point.
        let (contracted, f_contracted) = if f_reflected < worst {
            let c = project(&centroid, &vertices[n], -CONTRACT);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = project(&centroid, &vertices[n], CONTRACT);
            let fc = eval(&c);
            (c, fc)
        };

        if f_contracted < worst.min(f_reflected) {
            vertices[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // Shrink towards the best vertex.
        let anchor = vertices[0].clone();
        for i in 1..=n {
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(&vertices[i])
                .map(|(a, v)| a + SHRINK * (v - a))
                .collect();
            values[i] = eval(&shrunk);
            vertices[i] = shrunk;
        }
    }

    order_simplex(&mut vertices, &mut values);
    if !converged {
        converged = has_converged(&vertices, &values, opts);
    }

    SimplexReport {
        x: vertices.swap_remove(0),
        f: values[0],
        iterations,
        converged,
    }
}

fn order_simplex(vertices: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));
    *vertices = idx.iter().map(|&i| vertices[i].clone()).collect();
    *values = idx.iter().map(|&i| values[i]).collect();
}

fn has_converged(vertices: &[Vec<f64>], values: &[f64], opts: &SimplexOptions) -> bool {
    let best = values[0];
    if !best.is_finite() {
        return false;
    }
    let f_spread = values.iter().map(|v| (v - best).abs()).fold(0.0_f64, f64::max);
    let x_spread = vertices[1..]
        .iter()
        .flat_map(|v| v.iter().zip(&vertices[0]).map(|(a, b)| (a - b).abs()))
        .fold(0.0_f64, f64::max);
    f_spread <= opts.f_tol * (1.0 + best.abs()) && x_spread <= opts.x_tol
}

fn centroid_without_last(vertices: &[Vec<f64>]) -> Vec<f64> {
    let n = vertices.len() - 1;
    let mut c = vec![0.0; vertices[0].len()];
    for v in &vertices[..n] {
        for (ci, vi) in c.iter_mut().zip(v) {
            *ci += vi;
        }
    }
    c.iter_mut().for_each(|ci| *ci /= n as f64);
    c
}

/// `centroid + coef·(worst - centroid)`, clamped into the unit box.
fn project(centroid: &[f64], worst: &[f64], coef: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(worst)
        .map(|(c, w)| (c + coef * (w - c)).clamp(0.0, 1.0))
        .collect()
}
