//! Threshold solving and report assembly.
//!
//! - invert each side's fitted curve at the 0.5 and 0.05 sync rates
//! - round thresholds to the nearest 10 ms
//! - shape both sides into the fixed eight-column `SoaReport`
//!
//! Formatting for the terminal lives in `format`.

use crate::domain::{Side, SideFit, SideThresholds, SoaReport};
use crate::error::AppError;
use crate::models::invert;

pub mod format;

pub use format::*;

/// Sync rate defining the 50% threshold.
pub const TARGET_50: f64 = 0.5;
/// Sync rate defining the "95%" threshold (95% of trials judged asynchronous).
pub const TARGET_95: f64 = 0.05;

/// Magnitude above which every representable value is already coarser than 10 ms.
const ROUND10_LIMIT: f64 = 1e15;

/// Round to the nearest multiple of 10, ties away from zero.
///
/// `round10(round10(x)) == round10(x)` for every finite `x`.
pub fn round10(x: f64) -> f64 {
    if !x.is_finite() || x.abs() >= ROUND10_LIMIT {
        return x;
    }
    (x / 10.0).round() * 10.0
}

/// Invert one side's fitted curve at both target rates.
pub fn side_thresholds(fit: &SideFit) -> Result<SideThresholds, AppError> {
    let soa50 = invert(&fit.params, TARGET_50)
        .map_err(|e| e.at(format!("{} side / threshold 50%", fit.side)))?;
    let soa95 = invert(&fit.params, TARGET_95)
        .map_err(|e| e.at(format!("{} side / threshold 95%", fit.side)))?;
    Ok(SideThresholds {
        side: fit.side,
        soa50,
        soa95,
    })
}

/// Combine both sides into the persisted report row.
pub fn assemble_report(left: &SideThresholds, right: &SideThresholds) -> Result<SoaReport, AppError> {
    if left.side != Side::Left || right.side != Side::Right {
        return Err(AppError::config(format!(
            "Report expects (left, right) thresholds, got ({}, {}).",
            left.side, right.side
        )));
    }
    Ok(SoaReport {
        asoa50: left.soa50,
        asoa95: left.soa95,
        vsoa50: right.soa50,
        vsoa95: right.soa95,
        asoa50r: round10(left.soa50),
        asoa95r: round10(left.soa95),
        vsoa50r: round10(right.soa50),
        vsoa95r: round10(right.soa95),
    })
}

impl SoaReport {
    /// `(column name, value)` pairs in CSV column order.
    pub fn columns(&self) -> [(&'static str, f64); 8] {
        [
            ("ASOA50", self.asoa50),
            ("ASOA95", self.asoa95),
            ("VSOA50", self.vsoa50),
            ("VSOA95", self.vsoa95),
            ("ASOA50r", self.asoa50r),
            ("ASOA95r", self.asoa95r),
            ("VSOA50r", self.vsoa50r),
            ("VSOA95r", self.vsoa95r),
        ]
    }

    /// Unrounded `(soa50, soa95)` for one side.
    pub fn side(&self, side: Side) -> (f64, f64) {
        match side {
            Side::Left => (self.asoa50, self.asoa95),
            Side::Right => (self.vsoa50, self.vsoa95),
        }
    }
}
