//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output. Elements:
//! - observed sync rates: `o`
//! - fitted curves: `-`
//! - threshold crossings: `+`

use crate::domain::{FitStateFile, RateTable, Side, SideFit, SideThresholds};
use crate::models::sample_curve;
use crate::report::{TARGET_50, TARGET_95};

/// Sync rates live in [0, 1]; the y axis is fixed so plots are comparable.
const Y_RANGE: (f64, f64) = (0.0, 1.0);

/// Render both fitted sides over the observed rates.
pub fn render_tbw_plot(
    table: &RateTable,
    fits: &[SideFit],
    thresholds: &[SideThresholds],
    width: usize,
    height: usize,
) -> String {
    let points: Vec<(f64, f64)> = table.rows().iter().map(|r| (r.soa, r.sync_rate)).collect();
    let (x_min, x_max) = soa_range(&points);

    let width = width.max(10);
    let curves: Vec<Vec<(f64, f64)>> = fits
        .iter()
        .map(|fit| {
            let (lo, hi) = clip_to_side(fit.side, x_min, x_max);
            sample_curve(&fit.params, lo, hi, width)
        })
        .collect();

    render_plot(&points, &curves, &threshold_markers(thresholds), x_min, x_max, width, height)
}

/// Render a saved fit state (one side).
pub fn render_fit_state(state: &FitStateFile, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = state.points.iter().map(|r| (r.soa, r.sync_rate)).collect();
    let curve: Vec<(f64, f64)> = state
        .grid
        .soa_ms
        .iter()
        .copied()
        .zip(state.grid.rate.iter().copied())
        .collect();
    let (x_min, x_max) = range_of(curve.iter().chain(points.iter()).map(|&(x, _)| x))
        .unwrap_or_else(|| state.fit.side.plot_range());

    render_plot(
        &points,
        &[curve],
        &threshold_markers(std::slice::from_ref(&state.thresholds)),
        x_min,
        x_max,
        width,
        height,
    )
}

fn render_plot(
    points: &[(f64, f64)],
    curves: &[Vec<(f64, f64)>],
    markers: &[(f64, f64)],
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let (y_min, y_max) = Y_RANGE;

    let mut grid = vec![vec![' '; width]; height];

    // Curves first so points and markers overlay them.
    for curve in curves {
        draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);
    }
    for &(x, y) in points {
        grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = 'o';
    }
    for &(x, y) in markers {
        if x >= x_min && x <= x_max {
            grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = '+';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: SOA=[{x_min:.0}, {x_max:.0}] ms | sync rate=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn threshold_markers(thresholds: &[SideThresholds]) -> Vec<(f64, f64)> {
    thresholds
        .iter()
        .flat_map(|t| [(t.soa50, TARGET_50), (t.soa95, TARGET_95)])
        .filter(|(x, _)| x.is_finite())
        .collect()
}

/// Default ±300 ms window, widened to cover the data.
fn soa_range(points: &[(f64, f64)]) -> (f64, f64) {
    let (left, _) = Side::Left.plot_range();
    let (_, right) = Side::Right.plot_range();
    match range_of(points.iter().map(|&(x, _)| x)) {
        Some((lo, hi)) => (lo.min(left), hi.max(right)),
        None => (left, right),
    }
}

fn clip_to_side(side: Side, x_min: f64, x_max: f64) -> (f64, f64) {
    match side {
        Side::Left => (x_min, 0.0),
        Side::Right => (0.0, x_max),
    }
}

fn range_of(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() && hi > lo { Some((lo, hi)) } else { None }
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    // NaN lands on the bottom row.
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    let u = if u.is_nan() { 0.0 } else { u };
    // Row 0 is the top.
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
        let px = map_x(x, x_min, x_max, width);
        let py = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, px, py, '-'),
            None => grid[py][px] = '-',
        }
        prev = Some((px, py));
    }
}

/// Integer line drawing (Bresenham).
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
