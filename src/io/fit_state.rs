//! Read/write per-side fit state JSON.
//!
//! A fit state file holds everything needed to redraw or audit one side's fit
//! without refitting: parameters, quality, thresholds, the observed rates and
//! a precomputed curve grid. The schema is `domain::FitStateFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, FitStateFile, RateTable, SideFit, SideThresholds};
use crate::error::AppError;
use crate::io::trial_log::create_parent;
use crate::models::sample_curve;

const GRID_POINTS: usize = 101;

pub fn build_fit_state(subject: u32, fit: &SideFit, thresholds: &SideThresholds, table: &RateTable) -> FitStateFile {
    let (lo, hi) = fit.side.plot_range();
    let (soa_ms, rate) = sample_curve(&fit.params, lo, hi, GRID_POINTS).into_iter().unzip();

    FitStateFile {
        tool: "tbw".to_string(),
        generated_at: Utc::now(),
        subject,
        fit: fit.clone(),
        thresholds: *thresholds,
        points: table.side_rows(fit.side),
        grid: CurveGrid { soa_ms, rate },
    }
}

pub fn write_fit_state(path: &Path, state: &FitStateFile) -> Result<(), AppError> {
    create_parent(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create fit state '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, state)
        .map_err(|e| AppError::config(format!("Failed to write fit state JSON: {e}")))
}

pub fn read_fit_state(path: &Path) -> Result<FitStateFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open fit state '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::config(format!("Invalid fit state JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregate_rates;
    use crate::domain::{FitQuality, Response, Side, SigmoidParams, TrialRecord};

    #[test]
    fn fit_state_round_trips_through_json() {
        let trials = vec![
            TrialRecord { soa: -100.0, response: Response::Sync },
            TrialRecord { soa: 0.0, response: Response::Sync },
            TrialRecord { soa: 100.0, response: Response::Async },
        ];
        let table = aggregate_rates(&trials).unwrap();
        let params = SigmoidParams::new(0.9, 0.03, -100.0);
        let fit = SideFit {
            side: Side::Left,
            params,
            start: Side::Left.initial_guess(),
            quality: FitQuality { sse: 0.0, rmse: 0.0, n: 2, iterations: 7, attempts: 1 },
        };
        let thresholds = SideThresholds { side: Side::Left, soa50: -93.0, soa95: -160.0 };

        let state = build_fit_state(3, &fit, &thresholds, &table);
        assert_eq!(state.points.len(), 2);
        assert_eq!(state.grid.soa_ms.len(), GRID_POINTS);
        assert_eq!(state.grid.soa_ms[0], -300.0);
        assert_eq!(state.grid.soa_ms[GRID_POINTS - 1], 0.0);

        let path = std::env::temp_dir()
            .join(format!("tbw-fit-state-{}", std::process::id()))
            .join("left.json");
        write_fit_state(&path, &state).unwrap();
        let back = read_fit_state(&path).unwrap();
        assert_eq!(back.fit.side, Side::Left);
        assert!((back.fit.params.b - 0.03).abs() < 1e-15);
        assert_eq!(back.fit.quality.iterations, 7);
        assert_eq!(back.subject, 3);
        assert_eq!(back.generated_at, state.generated_at);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
