//! Trial log and schedule CSVs in the experiment's format.
//!
//! A running session appends one row per trial to its log so an aborted
//! session keeps every completed trial. Finished trial files are written once
//! and never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::experiment::PlannedTrial;

/// One logged trial.
///
/// `resp` is the raw key (`left`/`right`/`NaN`), `resp_recode` the judgment
/// (`sync`/`async`/`NaN`). `rt` is in seconds and NaN when nothing was pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialLogRow {
    pub subj: u32,
    pub block: usize,
    pub trial: usize,
    #[serde(rename = "SOA_label")]
    pub label: String,
    #[serde(rename = "SOA")]
    pub soa: i32,
    pub resp: String,
    pub resp_recode: String,
    pub rt: f64,
}

/// Append-only trial log.
pub struct TrialLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl TrialLog {
    /// Open `path` for appending, creating it (and its directory) if needed.
    ///
    /// The header is written only when the file is new or empty.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        create_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::config(format!("Failed to open trial log '{}': {e}", path.display())))?;
        let is_empty = file
            .metadata()
            .map(|m| m.len() == 0)
            .map_err(|e| AppError::config(format!("Failed to stat trial log '{}': {e}", path.display())))?;

        let writer = csv::WriterBuilder::new().has_headers(is_empty).from_writer(file);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, row: &TrialLogRow) -> Result<(), AppError> {
        self.writer
            .serialize(row)
            .and_then(|_| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| AppError::config(format!("Failed to append to trial log '{}': {e}", self.path.display())))
    }
}

/// Write a complete trial file. An existing file is never overwritten.
pub fn write_trials_csv(path: &Path, rows: &[TrialLogRow]) -> Result<(), AppError> {
    write_new_csv(path, "trial file", rows)
}

/// Write a planned schedule. An existing file is never overwritten.
pub fn write_schedule_csv(path: &Path, plan: &[PlannedTrial]) -> Result<(), AppError> {
    write_new_csv(path, "schedule", plan)
}

fn write_new_csv<T: Serialize>(path: &Path, what: &str, rows: &[T]) -> Result<(), AppError> {
    create_new_with(path, what, |file| {
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer.serialize(row).map_err(|e| format!("row: {e}"))?;
        }
        writer.flush().map_err(|e| format!("flush: {e}"))
    })
}

/// Create `path`, which must not exist yet, and fill it.
///
/// When `fill` or the final sync fails the file is removed again, so a failed
/// write never leaves a partial file that would block the next run.
pub(crate) fn create_new_with<F>(path: &Path, what: &str, fill: F) -> Result<(), AppError>
where
    F: FnOnce(&mut File) -> Result<(), String>,
{
    create_parent(path)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            IoErrorKind::AlreadyExists => AppError::already_exists(format!(
                "{what} '{}' already exists; refusing to overwrite.",
                path.display()
            )),
            _ => AppError::config(format!("Failed to create {what} '{}': {e}", path.display())),
        })?;

    let filled = fill(&mut file).and_then(|()| file.sync_all().map_err(|e| format!("sync: {e}")));
    drop(file);

    if let Err(reason) = filled {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("could not remove partial {what} '{}': {e}", path.display());
        }
        return Err(AppError::config(format!(
            "Failed to write {what} '{}': {reason}",
            path.display()
        )));
    }
    Ok(())
}

pub(crate) fn create_parent(path: &Path) -> Result<(), AppError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|e| AppError::config(format!("Failed to create directory '{}': {e}", dir.display()))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tbw-trial-log-{}-{name}", std::process::id()))
            .join("log.csv")
    }

    fn row(trial: usize, resp: &str, recode: &str) -> TrialLogRow {
        TrialLogRow {
            subj: 4,
            block: 1,
            trial,
            label: "-50".to_string(),
            soa: -50,
            resp: resp.to_string(),
            resp_recode: recode.to_string(),
            rt: 0.5,
        }
    }

    #[test]
    fn appending_across_opens_writes_one_header() {
        let path = temp_path("append");
        let _ = fs::remove_file(&path);

        {
            let mut log = TrialLog::open(&path).unwrap();
            log.append(&row(1, "left", "sync")).unwrap();
        }
        {
            let mut log = TrialLog::open(&path).unwrap();
            log.append(&row(2, "right", "async")).unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "subj,block,trial,SOA_label,SOA,resp,resp_recode,rt");
        assert!(lines[2].starts_with("4,1,2,-50,-50,right,async"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn trial_files_are_not_overwritten() {
        let path = temp_path("create-new");
        let _ = fs::remove_file(&path);

        write_trials_csv(&path, &[row(1, "left", "sync")]).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let err = write_trials_csv(&path, &[row(1, "right", "async")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn failed_write_removes_the_new_file() {
        use std::io::Write;

        let path = temp_path("failed-write");
        let _ = fs::remove_file(&path);

        let err = create_new_with(&path, "trial file", |file| {
            file.write_all(b"subj,block").map_err(|e| e.to_string())?;
            Err("No space left on device".to_string())
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("No space left on device"));
        assert!(!path.exists());

        // Nothing blocks a retry.
        write_trials_csv(&path, &[row(1, "left", "sync")]).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("subj,"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
