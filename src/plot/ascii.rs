//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observations: `o`
//! - fitted line: `-`

use crate::plot::{FitLine, finite_range, pad_range};

/// Render distance (x, Mpc) against velocity (y, km/s) with the fitted line.
pub fn render_ascii_plot(
    distances: &[f64],
    velocities: &[f64],
    line: FitLine,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = finite_range(distances).unwrap_or((0.0, 1.0));
    let curve = line.sample(x_min, x_max, width);

    let (y_min, y_max) = finite_range(velocities.iter().chain(curve.iter().map(|(_, y)| y))).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first so points overlay it.
    draw_curve(&mut grid, &curve, x_min, x_max, y_min, y_max);

    for (&d, &v) in distances.iter().zip(velocities) {
        if !(d.is_finite() && v.is_finite()) {
            continue;
        }
        let x = map_x(d, x_min, x_max, width);
        let y = map_y(v, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: D=[{x_min:.2}, {x_max:.2}] Mpc | v=[{y_min:.1}, {y_max:.1}] km/s\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let line = FitLine {
            slope: 100.0,
            intercept: 0.0,
        };
        let txt = render_ascii_plot(&[1.0, 10.0], &[100.0, 1100.0], line, 10, 5);
        let expected = concat!(
            "Plot: D=[1.00, 10.00] Mpc | v=[50.0, 1150.0] km/s\n",
            "         o\n",
            "       ---\n",
            "    ---   \n",
            " ---      \n",
            "o         \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn degenerate_input_still_renders() {
        let line = FitLine {
            slope: 70.0,
            intercept: 0.0,
        };
        let txt = render_ascii_plot(&[], &[], line, 20, 6);
        assert_eq!(txt.lines().count(), 7);
        assert!(txt.contains('-'));
    }
}
