//! SVG export of the Hubble diagram.
//!
//! Same content as the terminal plot: observations as dots and the fitted line,
//! drawn with plotters' SVG backend.

use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;
use crate::plot::{FitLine, finite_range, pad_range};

/// Pixel size of the written chart.
const SVG_SIZE: (u32, u32) = (900, 600);

/// Write the distance/velocity chart to `path`.
pub fn write_svg_plot(
    path: &Path,
    distances: &[f64],
    velocities: &[f64],
    line: FitLine,
    title: &str,
) -> Result<(), AppError> {
    draw(path, distances, velocities, line, title)
        .map_err(|e| AppError::new(2, format!("Failed to write SVG plot '{}': {e}", path.display())))
}

fn draw(
    path: &Path,
    distances: &[f64],
    velocities: &[f64],
    line: FitLine,
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (x0, x1) = finite_range(distances).unwrap_or((0.0, 1.0));
    let curve = line.sample(x0, x1, 100);
    let (y0, y1) = finite_range(velocities.iter().chain(curve.iter().map(|(_, y)| y))).unwrap_or((0.0, 1.0));
    let (x0, x1) = pad_range(x0, x1, 0.05);
    let (y0, y1) = pad_range(y0, y1, 0.05);

    let root = SVGBackend::new(path, SVG_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc("Distance (Mpc)")
        .y_desc("Velocity (km/s)")
        .x_labels(8)
        .y_labels(8)
        .draw()?;

    chart
        .draw_series(LineSeries::new(curve.iter().copied(), &RED))?
        .label(format!("v = {:.3}·D + {:.1}", line.slope, line.intercept))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .draw_series(
            distances
                .iter()
                .zip(velocities)
                .filter(|(d, v)| d.is_finite() && v.is_finite())
                .map(|(&d, &v)| Circle::new((d, v), 3, BLUE.filled())),
        )?
        .label("observations")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_an_svg_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hubble.svg");
        let line = FitLine {
            slope: 70.0,
            intercept: 0.0,
        };
        write_svg_plot(&path, &[10.0, 50.0, 100.0], &[720.0, 3480.0, 7010.0], line, "test").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("</svg>"));
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("hubble.svg");
        let line = FitLine {
            slope: 70.0,
            intercept: 0.0,
        };
        let err = write_svg_plot(&path, &[1.0, 2.0], &[70.0, 140.0], line, "x").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
