//! SVG chart of the fitted window.
//!
//! Observed rates as dots, each side's fitted curve, and the 50%/95%
//! crossings marked with their SOA values. Rendering is data-driven: all
//! series are prepared before any drawing happens.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use crate::domain::{RateTable, Side, SideFit, SideThresholds};
use crate::error::AppError;
use crate::io::trial_log::create_parent;
use crate::models::sample_curve;
use crate::report::{threshold_caption, TARGET_50, TARGET_95};

const CURVE_POINTS: usize = 301;
const CHART_SIZE: (u32, u32) = (960, 600);

struct ChartSeries {
    title: String,
    points: Vec<(f64, f64)>,
    curves: Vec<(Side, Vec<(f64, f64)>)>,
    /// Threshold crossings with their labels, e.g. `ASOA50 -40.8`.
    markers: Vec<(f64, f64, String)>,
    captions: Vec<(Side, String)>,
    x_bounds: (f64, f64),
}

/// Write the two-sided chart for one subject.
pub fn write_tbw_chart(
    path: &Path,
    subject: u32,
    table: &RateTable,
    fits: &[SideFit],
    thresholds: &[SideThresholds],
) -> Result<(), AppError> {
    create_parent(path)?;
    let series = prepare(subject, table, fits, thresholds);
    draw(path, &series).map_err(|e| AppError::config(format!("Failed to draw chart '{}': {e}", path.display())))
}

fn prepare(subject: u32, table: &RateTable, fits: &[SideFit], thresholds: &[SideThresholds]) -> ChartSeries {
    let points: Vec<(f64, f64)> = table.rows().iter().map(|r| (r.soa, r.sync_rate)).collect();
    let (data_lo, data_hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(x, _)| (lo.min(x), hi.max(x)));
    let x_bounds = (
        data_lo.min(Side::Left.plot_range().0),
        data_hi.max(Side::Right.plot_range().1),
    );

    let curves = fits
        .iter()
        .map(|fit| {
            let (lo, hi) = match fit.side {
                Side::Left => (x_bounds.0, 0.0),
                Side::Right => (0.0, x_bounds.1),
            };
            (fit.side, sample_curve(&fit.params, lo, hi, CURVE_POINTS))
        })
        .collect();

    let markers = thresholds
        .iter()
        .flat_map(|t| {
            let prefix = t.side.threshold_prefix();
            [
                (t.soa50, TARGET_50, format!("{prefix}50 {:.1}", t.soa50)),
                (t.soa95, TARGET_95, format!("{prefix}95 {:.1}", t.soa95)),
            ]
        })
        .filter(|(x, _, _)| x.is_finite() && *x >= x_bounds.0 && *x <= x_bounds.1)
        .collect();
    let captions = thresholds
        .iter()
        .map(|t| (t.side, threshold_caption(t.side, t.soa50, t.soa95)))
        .collect();

    ChartSeries {
        title: format!("Subject {subject}: temporal binding window"),
        points,
        curves,
        markers,
        captions,
        x_bounds,
    }
}

fn side_color(side: Side) -> RGBColor {
    match side {
        Side::Left => RGBColor(31, 119, 180),
        Side::Right => RGBColor(214, 39, 40),
    }
}

fn draw(path: &Path, series: &ChartSeries) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x0, x1) = series.x_bounds;
    let mut chart = ChartBuilder::on(&root)
        .caption(&series.title, ("sans-serif", 22))
        .margin(16)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, 0.0..1.05)?;

    chart
        .configure_mesh()
        .x_desc("SOA (ms, negative = audio first)")
        .y_desc("Sync rate")
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.1}"))
        .draw()?;

    for (side, curve) in &series.curves {
        let color = side_color(*side);
        chart
            .draw_series(LineSeries::new(curve.iter().copied(), color.stroke_width(2)))?
            .label(side.display_name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart.draw_series(series.points.iter().map(|&p| Circle::new(p, 4, BLACK.filled())))?;

    let marker_style = ("sans-serif", 12).into_font();
    for (x, y, label) in &series.markers {
        let (x, y) = (*x, *y);
        chart.draw_series(std::iter::once(PathElement::new(vec![(x, 0.0), (x, y)], BLACK.mix(0.4))))?;
        chart.draw_series(std::iter::once(Cross::new((x, y), 6, BLACK.stroke_width(2))))?;
        // Label sits just above and right of the marker.
        chart.draw_series(std::iter::once(Text::new(
            label.clone(),
            (x + 0.01 * (x1 - x0), y + 0.03),
            marker_style.clone(),
        )))?;
    }

    let caption_style = ("sans-serif", 14).into_font();
    for (idx, (side, caption)) in series.captions.iter().enumerate() {
        let y = 1.0 - 0.06 * idx as f64;
        let x = x0 + 0.02 * (x1 - x0);
        chart.draw_series(std::iter::once(Text::new(
            caption.clone(),
            (x, y),
            caption_style.clone().color(&side_color(*side)),
        )))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
