//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to CSV/JSON
//! - reloaded later for plotting or for the next experiment phase

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which half of the SOA axis a fit covers.
///
/// SOA = 0 belongs to both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// SOA <= 0: the auditory stimulus leads.
    Left,
    /// SOA >= 0: the visual stimulus leads.
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Side::Left => "left (auditory leading)",
            Side::Right => "right (visual leading)",
        }
    }

    /// Column prefix of this side's thresholds in the SOA report.
    pub fn threshold_prefix(self) -> &'static str {
        match self {
            Side::Left => "ASOA",
            Side::Right => "VSOA",
        }
    }

    pub fn contains(self, soa: f64) -> bool {
        match self {
            Side::Left => soa <= 0.0,
            Side::Right => soa >= 0.0,
        }
    }

    /// Starting point for the optimizer.
    ///
    /// The left curve rises towards SOA = 0 with its inflection on the negative
    /// axis; the right curve falls with its inflection on the positive axis.
    pub fn initial_guess(self) -> SigmoidParams {
        match self {
            Side::Left => SigmoidParams::new(1.0, 0.01, -150.0),
            Side::Right => SigmoidParams::new(1.0, -0.01, 150.0),
        }
    }

    /// SOA range (ms) used when sampling the fitted curve for plots.
    pub fn plot_range(self) -> (f64, f64) {
        match self {
            Side::Left => (-300.0, 0.0),
            Side::Right => (0.0, 300.0),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Categorical synchrony judgment for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Sync,
    Async,
    /// No key press within the response window.
    Missing,
}

impl Response {
    /// Parse a recoded response label.
    ///
    /// Empty cells and `NaN`-like markers are treated as missing responses.
    /// Returns `None` for labels outside the sync/async/missing vocabulary.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() {
            return Some(Response::Missing);
        }
        match label.to_ascii_lowercase().as_str() {
            "sync" => Some(Response::Sync),
            "async" => Some(Response::Async),
            "nan" | "na" | "none" | "missing" => Some(Response::Missing),
            _ => None,
        }
    }

    /// Label written to trial logs (matches what `parse` accepts).
    pub fn label(self) -> &'static str {
        match self {
            Response::Sync => "sync",
            Response::Async => "async",
            Response::Missing => "NaN",
        }
    }

    pub fn is_sync(self) -> bool {
        self == Response::Sync
    }
}

/// A single trial: signed SOA (ms, negative = audio leads) and the judgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialRecord {
    pub soa: f64,
    pub response: Response,
}

/// Aggregated counts for one distinct SOA value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub soa: f64,
    pub count_sync: usize,
    /// All trials at this SOA, including missing responses.
    pub count_total: usize,
    pub sync_rate: f64,
}

/// Rate table: one row per distinct SOA, sorted by ascending SOA.
///
/// Built once by `data::rates::aggregate_rates` and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rows: Vec<RateRow>,
}

impl RateTable {
    /// Wrap rows that are already sorted by SOA with no duplicates.
    pub(crate) fn from_sorted_rows(rows: Vec<RateRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows belonging to one side (SOA = 0 appears on both sides).
    pub fn side_rows(&self, side: Side) -> Vec<RateRow> {
        self.rows.iter().copied().filter(|r| side.contains(r.soa)).collect()
    }

    /// `(soa, sync_rate)` vectors for one side, ready for fitting.
    pub fn side_xy(&self, side: Side) -> (Vec<f64>, Vec<f64>) {
        self.rows
            .iter()
            .filter(|r| side.contains(r.soa))
            .map(|r| (r.soa, r.sync_rate))
            .unzip()
    }

    pub fn total_trials(&self) -> usize {
        self.rows.iter().map(|r| r.count_total).sum()
    }
}

/// Sigmoid parameters: `rate(soa) = a / (1 + exp(-b * (soa - c)))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidParams {
    /// Amplitude (upper asymptote).
    pub a: f64,
    /// Steepness; positive for a rising curve, negative for a falling one.
    pub b: f64,
    /// Inflection location (ms), where the curve passes `a / 2`.
    pub c: f64,
}

impl SigmoidParams {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }
}

/// Fit diagnostics for one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    /// Optimizer iterations used by the successful attempt.
    pub iterations: usize,
    /// 1 when the primary start converged, more when perturbed restarts were needed.
    pub attempts: usize,
}

/// Fit output for one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideFit {
    pub side: Side,
    pub params: SigmoidParams,
    /// Starting point of the attempt that converged.
    pub start: SigmoidParams,
    pub quality: FitQuality,
}

/// SOA thresholds recovered from one side's fitted curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideThresholds {
    pub side: Side,
    /// SOA where the fitted sync rate equals 0.5.
    pub soa50: f64,
    /// SOA where the fitted sync rate equals 0.05 (the "95%" point: 95% of
    /// trials judged asynchronous).
    pub soa95: f64,
}

/// Fixed-schema per-subject output row.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoaReport {
    #[serde(rename = "ASOA50")]
    pub asoa50: f64,
    #[serde(rename = "ASOA95")]
    pub asoa95: f64,
    #[serde(rename = "VSOA50")]
    pub vsoa50: f64,
    #[serde(rename = "VSOA95")]
    pub vsoa95: f64,
    #[serde(rename = "ASOA50r")]
    pub asoa50r: f64,
    #[serde(rename = "ASOA95r")]
    pub asoa95r: f64,
    #[serde(rename = "VSOA50r")]
    pub vsoa50r: f64,
    #[serde(rename = "VSOA95r")]
    pub vsoa95r: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, `.env`, and defaults.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub subject: u32,
    /// Trial-level CSV to analyze.
    pub input_path: PathBuf,
    /// Destination of the SOA report; its existence aborts the run.
    pub output_path: PathBuf,
    /// SVG chart destination (best-effort).
    pub chart_path: Option<PathBuf>,
    /// Directory for serialized per-side fit state.
    pub fit_state_dir: Option<PathBuf>,

    /// Name of the SOA column in the trial CSV.
    pub soa_column: String,
    /// Name of the recoded response column; `None` means auto-detect.
    pub response_column: Option<String>,

    pub max_iterations: usize,
    /// Perturbed restarts allowed after the primary start fails.
    pub retries: usize,
    pub seed: u64,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

/// A saved per-side fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitStateFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub subject: u32,
    pub fit: SideFit,
    pub thresholds: SideThresholds,
    /// Observed rate rows the fit was computed from.
    pub points: Vec<RateRow>,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub soa_ms: Vec<f64>,
    pub rate: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_soa_belongs_to_both_sides() {
        assert!(Side::Left.contains(0.0));
        assert!(Side::Right.contains(0.0));
        assert!(!Side::Left.contains(10.0));
        assert!(!Side::Right.contains(-10.0));
    }

    #[test]
    fn response_parse_accepts_missing_markers() {
        assert_eq!(Response::parse("sync"), Some(Response::Sync));
        assert_eq!(Response::parse(" ASYNC "), Some(Response::Async));
        assert_eq!(Response::parse("NaN"), Some(Response::Missing));
        assert_eq!(Response::parse(""), Some(Response::Missing));
        assert_eq!(Response::parse("maybe"), None);
        assert_eq!(Response::parse(Response::Missing.label()), Some(Response::Missing));
    }

    #[test]
    fn side_xy_splits_at_zero() {
        let row = |soa: f64, rate: f64| RateRow {
            soa,
            count_sync: 0,
            count_total: 1,
            sync_rate: rate,
        };
        let table = RateTable::from_sorted_rows(vec![row(-100.0, 0.1), row(0.0, 0.9), row(100.0, 0.2)]);
        let (lx, ly) = table.side_xy(Side::Left);
        let (rx, _) = table.side_xy(Side::Right);
        assert_eq!(lx, vec![-100.0, 0.0]);
        assert_eq!(ly, vec![0.1, 0.9]);
        assert_eq!(rx, vec![0.0, 100.0]);
    }
}
