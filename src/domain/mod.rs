//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - trial-level inputs (`TrialRecord`, `Response`)
//! - the per-SOA aggregate (`RateRow`, `RateTable`)
//! - fit outputs (`SigmoidParams`, `SideFit`, `SideThresholds`, `SoaReport`)
//! - the resolved run configuration (`FitConfig`)

pub mod types;

pub use types::*;
