//! Trial CSV ingest and validation.
//!
//! Turns a trial-level CSV into `TrialRecord`s that are safe to aggregate.
//! Required columns missing from the header are fatal (configuration error);
//! individual malformed rows are skipped and reported.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Response, TrialRecord};
use crate::error::AppError;
use crate::experiment::Counterbalance;

/// Recoded judgment column written by the experiment.
pub const RECODED_COLUMN: &str = "resp_recode";
/// Raw key column written by the experiment.
pub const RAW_KEY_COLUMN: &str = "resp";

/// Where each trial's judgment was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    /// A column holding `sync`/`async`/missing labels.
    Recoded(String),
    /// The raw key column, recoded with the subject's counterbalance.
    RawKeys(Counterbalance),
}

impl ResponseSource {
    pub fn describe(&self) -> String {
        match self {
            ResponseSource::Recoded(column) => format!("column `{column}`"),
            ResponseSource::RawKeys(cb) => format!(
                "column `{RAW_KEY_COLUMN}` recoded ({} key = sync)",
                cb.sync_key().label()
            ),
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedTrials {
    pub trials: Vec<TrialRecord>,
    pub source: ResponseSource,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl IngestedTrials {
    pub fn missing_responses(&self) -> usize {
        self.trials.iter().filter(|t| t.response == Response::Missing).count()
    }
}

/// Load trial records from `path`.
///
/// `response_column` forces the judgment column; otherwise `resp_recode` is
/// used when present, else raw `resp` keys are recoded for `subject`.
pub fn load_trials(
    path: &Path,
    soa_column: &str,
    response_column: Option<&str>,
    subject: u32,
) -> Result<IngestedTrials, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open trial CSV '{}': {e}", path.display())))?;
    read_trials(file, soa_column, response_column, subject)
}

pub(crate) fn read_trials<R: Read>(
    input: R,
    soa_column: &str,
    response_column: Option<&str>,
    subject: u32,
) -> Result<IngestedTrials, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::config(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let soa_key = normalize_header_name(soa_column);
    let soa_idx = *header_map
        .get(&soa_key)
        .ok_or_else(|| AppError::config(format!("Missing required column: `{soa_column}`")))?;
    let (resp_idx, source) = resolve_response_column(&header_map, response_column, subject)?;

    let mut trials = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, soa_idx, resp_idx, &source) {
            Ok(trial) => trials.push(trial),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for err in &row_errors {
        log::warn!("skipping trial row {}: {}", err.line, err.message);
    }

    let rows_used = trials.len();
    if rows_used == 0 {
        return Err(AppError::config("No valid trial rows remain after validation."));
    }

    Ok(IngestedTrials {
        trials,
        source,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn resolve_response_column(
    header_map: &HashMap<String, usize>,
    explicit: Option<&str>,
    subject: u32,
) -> Result<(usize, ResponseSource), AppError> {
    if let Some(column) = explicit {
        let idx = header_map
            .get(&normalize_header_name(column))
            .ok_or_else(|| AppError::config(format!("Missing required column: `{column}`")))?;
        return Ok((*idx, ResponseSource::Recoded(column.to_string())));
    }
    if let Some(idx) = header_map.get(RECODED_COLUMN) {
        return Ok((*idx, ResponseSource::Recoded(RECODED_COLUMN.to_string())));
    }
    if let Some(idx) = header_map.get(RAW_KEY_COLUMN) {
        return Ok((*idx, ResponseSource::RawKeys(Counterbalance::for_subject(subject))));
    }
    Err(AppError::config(format!(
        "No response column found: expected `{RECODED_COLUMN}` or `{RAW_KEY_COLUMN}`."
    )))
}

fn parse_row(
    record: &StringRecord,
    soa_idx: usize,
    resp_idx: usize,
    source: &ResponseSource,
) -> Result<TrialRecord, String> {
    let soa_raw = record
        .get(soa_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing SOA value.".to_string())?;
    let soa = soa_raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid SOA '{soa_raw}' (must be a finite number)."))?;

    // A short row has no response at all; treat it like an empty cell.
    let label = record.get(resp_idx).unwrap_or("");
    let response = match source {
        ResponseSource::Recoded(_) => Response::parse(label),
        ResponseSource::RawKeys(cb) => cb.recode_label(label),
    }
    .ok_or_else(|| format!("Unknown response label '{label}'."))?;

    Ok(TrialRecord { soa, response })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ingest(csv: &str, subject: u32) -> Result<IngestedTrials, AppError> {
        read_trials(csv.as_bytes(), "SOA", None, subject)
    }

    #[test]
    fn recoded_column_is_preferred() {
        let csv = "\u{feff}subj,block,trial,SOA,resp,resp_recode,rt\n\
                   4,1,1,-50,right,sync,0.5\n\
                   4,1,2,100,left,async,0.6\n\
                   4,1,3,0,NaN,NaN,NaN\n";
        let data = ingest(csv, 4).unwrap();
        assert_eq!(data.source, ResponseSource::Recoded("resp_recode".to_string()));
        assert_eq!(data.rows_used, 3);
        assert_eq!(data.trials[0], TrialRecord { soa: -50.0, response: Response::Sync });
        assert_eq!(data.trials[1].response, Response::Async);
        assert_eq!(data.missing_responses(), 1);
    }

    #[test]
    fn raw_keys_are_recoded_by_subject() {
        let csv = "SOA,resp\n-50,left\n-50,right\n10,\n";
        let even = ingest(csv, 4).unwrap();
        assert_eq!(even.trials[0].response, Response::Sync);
        assert_eq!(even.trials[1].response, Response::Async);
        assert_eq!(even.trials[2].response, Response::Missing);

        let odd = ingest(csv, 5).unwrap();
        assert_eq!(odd.trials[0].response, Response::Async);
        assert_eq!(odd.trials[1].response, Response::Sync);
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = "SOA,resp_recode\n-50,sync\nabc,sync\n10,maybe\ninf,async\n20,async\n";
        let data = ingest(csv, 1).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn schema_errors_are_configuration_errors() {
        let no_soa = ingest("delay,resp_recode\n1,sync\n", 1).unwrap_err();
        assert_eq!(no_soa.kind(), ErrorKind::Configuration);

        let no_resp = ingest("SOA,rt\n1,0.5\n", 1).unwrap_err();
        assert_eq!(no_resp.kind(), ErrorKind::Configuration);

        let empty = ingest("SOA,resp_recode\n", 1).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn explicit_columns_are_case_insensitive() {
        let csv = "Delay,Judgment\n-30,sync\n";
        let data = read_trials(csv.as_bytes(), "delay", Some("judgment"), 1).unwrap();
        assert_eq!(data.trials[0].soa, -30.0);
        assert_eq!(data.source, ResponseSource::Recoded("judgment".to_string()));
    }
}
