//! SOA report CSV.
//!
//! The report is the run's idempotency marker: it is written exactly once per
//! subject and never overwritten. Phase B reads it back to build its schedule.

use std::fs::File;
use std::path::Path;

use crate::domain::SoaReport;
use crate::error::AppError;
use crate::io::trial_log::create_new_with;

/// Fail with `AlreadyExists` when the report is already on disk.
///
/// A path whose existence cannot be determined (permissions, I/O errors) is a
/// configuration error rather than "absent".
pub fn ensure_output_absent(path: &Path) -> Result<(), AppError> {
    match path.try_exists() {
        Ok(false) => Ok(()),
        Ok(true) => Err(AppError::already_exists(format!(
            "SOA report '{}' already exists; nothing to do.",
            path.display()
        ))),
        Err(e) => Err(AppError::config(format!(
            "Cannot check for SOA report '{}': {e}",
            path.display()
        ))),
    }
}

/// Write the single-row report. Refuses to replace an existing file, even one
/// created after the run started, and leaves nothing behind when the write fails.
pub fn write_soa_report(path: &Path, report: &SoaReport) -> Result<(), AppError> {
    create_new_with(path, "SOA report", |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.serialize(report).map_err(|e| format!("row: {e}"))?;
        writer.flush().map_err(|e| format!("flush: {e}"))
    })
}

/// Read a report written by `write_soa_report`.
pub fn read_soa_report(path: &Path) -> Result<SoaReport, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open SOA report '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    reader
        .deserialize::<SoaReport>()
        .next()
        .ok_or_else(|| AppError::config(format!("SOA report '{}' has no data row.", path.display())))?
        .map_err(|e| AppError::config(format!("Invalid SOA report '{}': {e}", path.display())))
}
