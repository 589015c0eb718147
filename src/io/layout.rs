//! File layout under the data root.
//!
//! The root comes from `--data-dir`, else `TBW_DATA_DIR` (a `.env` file is
//! honored), else `data` relative to the current directory.

use std::path::{Path, PathBuf};

use crate::domain::Side;

pub const DATA_DIR_ENV: &str = "TBW_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the data root from an explicit flag, the environment, or the default.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(root) = explicit {
            return Self::new(root);
        }
        dotenvy::dotenv().ok();
        match std::env::var(DATA_DIR_ENV) {
            Ok(root) if !root.trim().is_empty() => Self::new(root.trim()),
            _ => Self::new(DEFAULT_DATA_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Phase-A trial data for a subject.
    pub fn trials(&self, subject: u32) -> PathBuf {
        self.root.join("msi_a").join(format!("msi_a_sub{subject}.csv"))
    }

    /// Threshold report consumed by phase B.
    pub fn soa_report(&self, subject: u32) -> PathBuf {
        self.root.join("SOAs").join(format!("msi_a_sub{subject}_SOAs.csv"))
    }

    pub fn chart(&self, subject: u32) -> PathBuf {
        self.root.join("plots").join(format!("msi_a_sub{subject}_TBW.svg"))
    }

    pub fn fit_state_dir(&self) -> PathBuf {
        self.root.join("fit_results")
    }

    /// Append-only per-trial log written while a session runs.
    pub fn trial_log(&self, subject: u32) -> PathBuf {
        self.root
            .join("logfiles")
            .join("msi_a")
            .join(format!("msi_a_sub{subject}_log.csv"))
    }
}

/// Fit state file for one side inside `dir`.
pub fn fit_state_path(dir: &Path, subject: u32, side: Side) -> PathBuf {
    dir.join(format!("msi_a_sub{subject}_{}_fit.json", side.label()))
}
