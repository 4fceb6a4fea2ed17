use std::error::Error as StdError;

use plotters::prelude::*;

use crate::analysis::DatasetAnalysis;
use crate::config::{Config, PlotConfig};
use crate::dataset::{Domain, Point};
use crate::{Error, Result};

const PALETTE: [RGBColor; 6] = [
    BLUE,
    RED,
    RGBColor(34, 139, 34),
    MAGENTA,
    RGBColor(255, 140, 0),
    CYAN,
];

/// Padded range covering every point and its error bar, along one axis
fn auto_range<'a>(
    datasets: impl Iterator<Item = &'a DatasetAnalysis>,
    bounds: impl Fn(&Point<f64>) -> (f64, f64),
) -> Domain<f64> {
    let (min, max) = datasets
        .flat_map(|analysis| analysis.dataset.points().iter())
        .map(bounds)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), (lo, hi)| {
            (min.min(lo), max.max(hi))
        });
    if !(min.is_finite() && max.is_finite()) {
        return Domain::new(0.0, 1.0);
    }
    let padding = if max > min { 0.05 * (max - min) } else { 1.0 };
    Domain::new(min - padding, max + padding)
}

fn axis_ranges(datasets: &[DatasetAnalysis], plot: &PlotConfig) -> (Domain<f64>, Domain<f64>) {
    let x = plot.x_range.unwrap_or_else(|| {
        auto_range(datasets.iter(), |p| (p.x - p.sigma_x, p.x + p.sigma_x))
    });
    let y = plot.y_range.unwrap_or_else(|| {
        auto_range(datasets.iter(), |p| (p.y - p.sigma_y, p.y + p.sigma_y))
    });
    (x, y)
}

fn draw(
    datasets: &[DatasetAnalysis],
    config: &Config,
) -> std::result::Result<(), Box<dyn StdError>> {
    let plot = &config.plot;
    let (x_range, y_range) = axis_ranges(datasets, plot);

    let root = SVGBackend::new(&config.output, (plot.width, plot.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&plot.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.min..x_range.max, y_range.min..y_range.max)?;

    chart
        .configure_mesh()
        .x_desc(plot.x_label.as_str())
        .y_desc(plot.y_label.as_str())
        .draw()?;

    for (analysis, &color) in datasets.iter().zip(PALETTE.iter().cycle()) {
        let points = analysis.dataset.points();
        chart.draw_series(points.iter().map(|p| {
            ErrorBar::new_vertical(p.x, p.y - p.sigma_y, p.y, p.y + p.sigma_y, color, 6)
        }))?;
        chart.draw_series(points.iter().map(|p| {
            ErrorBar::new_horizontal(p.y, p.x - p.sigma_x, p.x, p.x + p.sigma_x, color, 6)
        }))?;
        chart
            .draw_series(points.iter().map(|p| Circle::new((p.x, p.y), 3, color.filled())))?
            .label(analysis.label())
            .legend(move |(x, y)| Circle::new((x, y), 3, color.filled()));

        if !config.draw_fits {
            continue;
        }
        if let Some(line) = analysis.line() {
            let domain = line.domain();
            chart
                .draw_series(LineSeries::new(
                    [domain.min, domain.max].map(|x| (x, line.evaluate(x))),
                    color.stroke_width(2),
                ))?
                .label(format!("Fit {}", analysis.label()))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Draw every dataset with its error bars, and the fitted lines over their domains when
/// `draw_fits` is set, to the SVG file `config.output`.
///
/// # Errors
/// [`Error::Render`] if the chart cannot be drawn or the file cannot be written.
pub fn render(datasets: &[DatasetAnalysis], config: &Config) -> Result<()> {
    draw(datasets, config).map_err(|e| Error::Render {
        path: config.output.clone(),
        reason: e.to_string(),
    })?;
    log::info!("saved chart to {}", config.output.display());
    Ok(())
}
