//! Rate aggregation: trial records -> per-SOA synchrony rates.
//!
//! Missing responses count toward a SOA's total but never toward its sync
//! count, so a subject who often fails to answer at some SOA shows a lower
//! sync rate there.

use crate::domain::{RateRow, RateTable, TrialRecord};
use crate::error::AppError;

/// Build the rate table for a sequence of trials.
pub fn aggregate_rates(trials: &[TrialRecord]) -> Result<RateTable, AppError> {
    if trials.is_empty() {
        return Err(AppError::config("No trials to aggregate."));
    }
    if let Some(bad) = trials.iter().find(|t| !t.soa.is_finite()) {
        return Err(AppError::config(format!("Non-finite SOA value: {}", bad.soa)));
    }

    let mut sorted: Vec<&TrialRecord> = trials.iter().collect();
    sorted.sort_by(|a, b| a.soa.total_cmp(&b.soa));

    let mut rows: Vec<RateRow> = Vec::new();
    for trial in sorted {
        let is_sync = usize::from(trial.response.is_sync());
        // `==` rather than bit equality so -0.0 and 0.0 share a row.
        if let Some(row) = rows.last_mut().filter(|r| r.soa == trial.soa) {
            row.count_total += 1;
            row.count_sync += is_sync;
            continue;
        }
        rows.push(RateRow {
            // Normalizes -0.0 to 0.0.
            soa: trial.soa + 0.0,
            count_sync: is_sync,
            count_total: 1,
            sync_rate: 0.0,
        });
    }

    for row in &mut rows {
        row.sync_rate = row.count_sync as f64 / row.count_total as f64;
    }

    Ok(RateTable::from_sorted_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Response, Side};
    use crate::error::ErrorKind;

    fn trial(soa: f64, response: Response) -> TrialRecord {
        TrialRecord { soa, response }
    }

    #[test]
    fn missing_responses_count_toward_total_only() {
        let trials = vec![
            trial(-100.0, Response::Sync),
            trial(-100.0, Response::Async),
            trial(-100.0, Response::Missing),
            trial(-100.0, Response::Sync),
            trial(50.0, Response::Missing),
        ];
        let table = aggregate_rates(&trials).unwrap();
        assert_eq!(table.len(), 2);

        let first = table.rows()[0];
        assert_eq!(first.soa, -100.0);
        assert_eq!(first.count_sync, 2);
        assert_eq!(first.count_total, 4);
        assert!((first.sync_rate - 0.5).abs() < 1e-12);

        let second = table.rows()[1];
        assert_eq!(second.count_sync, 0);
        assert_eq!(second.count_total, 1);
        assert_eq!(second.sync_rate, 0.0);
        assert_eq!(table.total_trials(), 5);
    }

    #[test]
    fn rows_are_sorted_and_zero_is_shared() {
        let trials = vec![
            trial(300.0, Response::Async),
            trial(-0.0, Response::Sync),
            trial(-300.0, Response::Async),
            trial(0.0, Response::Async),
        ];
        let table = aggregate_rates(&trials).unwrap();
        let soas: Vec<f64> = table.rows().iter().map(|r| r.soa).collect();
        assert_eq!(soas, vec![-300.0, 0.0, 300.0]);
        assert_eq!(table.rows()[1].count_total, 2);
        assert!(table.rows()[1].soa.is_sign_positive());

        assert_eq!(table.side_rows(Side::Left).len(), 2);
        assert_eq!(table.side_rows(Side::Right).len(), 2);
    }

    #[test]
    fn empty_or_non_finite_input_is_a_configuration_error() {
        assert_eq!(aggregate_rates(&[]).unwrap_err().kind(), ErrorKind::Configuration);
        let err = aggregate_rates(&[trial(f64::NAN, Response::Sync)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
