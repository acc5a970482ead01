//! PNG charts of a regression report and of per-decade scores.
use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;

use crate::error::{PipelineError, Result};
use crate::runner::{DecadeScore, RegressionReport};

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Horizontal bar chart of the fitted coefficients, intercept excluded.
pub fn coefficients(report: &RegressionReport, path: &Path) -> Result<()> {
    let bars: Vec<(String, f64)> = report
        .features
        .iter()
        .filter_map(|name| Some((name.clone(), report.model.feature(name)?.0)))
        .collect();
    draw_coefficients(&bars, path).map_err(|e| plot_error(path, e))
}

/// R² of every decade, one point per decade joined by a line.
pub fn r_squared_by_decade(scores: &[DecadeScore], path: &Path) -> Result<()> {
    draw_decades(scores, path).map_err(|e| plot_error(path, e))
}

fn plot_error(path: &Path, err: Box<dyn std::error::Error>) -> PipelineError {
    PipelineError::Plot {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Axis span covering zero and every coefficient, padded by 10%.
fn coefficient_range(coefs: &[f64]) -> Range<f64> {
    let min_x = coefs.iter().copied().fold(0.0, f64::min);
    let max_x = coefs.iter().copied().fold(0.0, f64::max);
    let pad = ((max_x - min_x) * 0.1).max(0.1);
    (min_x - pad)..(max_x + pad)
}

fn decade_range(scores: &[DecadeScore]) -> Range<i32> {
    let lo = scores.iter().map(|s| s.decade).min().unwrap_or(0);
    let hi = scores.iter().map(|s| s.decade).max().unwrap_or(0);
    (lo - 5)..(hi + 5)
}

fn draw_coefficients(bars: &[(String, f64)], path: &Path) -> DrawResult {
    let names: Vec<&str> = bars.iter().map(|(n, _)| n.as_str()).collect();
    let coefs: Vec<f64> = bars.iter().map(|(_, c)| *c).collect();
    let count = bars.len().max(1);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Selected features", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(220)
        .build_cartesian_2d(coefficient_range(&coefs), 0..count)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(count)
        .y_label_formatter(&|idx| names.get(*idx).map(|n| n.to_string()).unwrap_or_default())
        .x_desc("Coefficient")
        .y_desc("Feature")
        .draw()?;

    chart.draw_series(coefs.iter().enumerate().map(|(i, &coef)| {
        let color = if coef >= 0.0 { BLUE } else { RED };
        Rectangle::new([(coef.min(0.0), i), (coef.max(0.0), i + 1)], color.mix(0.5).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn draw_decades(scores: &[DecadeScore], path: &Path) -> DrawResult {
    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("R² by decade", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(decade_range(scores), 0.0..1.0)?;

    chart
        .configure_mesh()
        .x_labels(scores.len().max(2))
        .x_desc("Decade")
        .y_desc("R²")
        .draw()?;

    let points: Vec<(i32, f64)> = scores.iter().map(|s| (s.decade, s.r_squared)).collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(d, r2)| Circle::new((d, r2), 4, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_axis_always_contains_zero() {
        let r = coefficient_range(&[0.5, 2.0]);
        assert!(r.start < 0.0 && r.end > 2.0);
        let r = coefficient_range(&[-3.0]);
        assert!(r.start < -3.0 && r.end > 0.0);
        let r = coefficient_range(&[]);
        assert!(r.start < r.end);
    }

    #[test]
    fn decade_axis_pads_both_ends() {
        let score = |decade| DecadeScore {
            decade,
            r_squared: 0.3,
            n_obs: 10,
            features: Vec::new(),
        };
        assert_eq!(decade_range(&[score(1990), score(1970)]), 1965..1995);
    }
}
