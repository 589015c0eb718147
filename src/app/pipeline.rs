//! The analysis pipeline shared by `tbw fit` and `tbw rates`.
//!
//! gate -> ingest -> aggregate -> fit (left, right) -> invert -> assemble -> persist
//!
//! Presentation (printing, terminal plots) stays in `app`.

use std::path::PathBuf;

use log::{info, warn};

use crate::data::aggregate_rates;
use crate::domain::{FitConfig, RateTable, Side, SideFit, SideThresholds, SoaReport};
use crate::error::AppError;
use crate::fit::{fit_side, FitOptions};
use crate::io::{
    build_fit_state, ensure_output_absent, fit_state_path, load_trials, write_fit_state, write_soa_report,
    IngestedTrials,
};
use crate::plot::write_tbw_chart;
use crate::report::{assemble_report, side_thresholds};

/// All computed outputs of a single `tbw fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedTrials,
    pub table: RateTable,
    /// Left then right.
    pub fits: Vec<SideFit>,
    pub thresholds: Vec<SideThresholds>,
    pub report: SoaReport,
    /// Best-effort artifacts that were actually written.
    pub chart_written: Option<PathBuf>,
    pub fit_states_written: Vec<PathBuf>,
}

/// Ingest a trial file and aggregate it into a rate table.
pub fn load_rate_table(
    input_path: &std::path::Path,
    soa_column: &str,
    response_column: Option<&str>,
    subject: u32,
) -> Result<(IngestedTrials, RateTable), AppError> {
    let ingest = load_trials(input_path, soa_column, response_column, subject)?;
    info!(
        "ingested {} of {} rows from '{}'",
        ingest.rows_used,
        ingest.rows_read,
        input_path.display()
    );
    let table = aggregate_rates(&ingest.trials)?;
    Ok((ingest, table))
}

/// Execute the full analysis.
///
/// An existing report aborts before any input is read. The report is written
/// only after both sides fitted and inverted; chart and fit state are
/// best-effort and never fail the run.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    ensure_output_absent(&config.output_path)?;

    let (ingest, table) = load_rate_table(
        &config.input_path,
        &config.soa_column,
        config.response_column.as_deref(),
        config.subject,
    )?;

    let opts = FitOptions {
        max_iterations: config.max_iterations,
        retries: config.retries,
        seed: config.seed,
    };
    let fits = Side::BOTH
        .iter()
        .map(|&side| fit_side(side, &table, &opts))
        .collect::<Result<Vec<_>, _>>()?;
    let thresholds = fits.iter().map(side_thresholds).collect::<Result<Vec<_>, _>>()?;
    let report = assemble_report(&thresholds[0], &thresholds[1])?;

    write_soa_report(&config.output_path, &report)?;
    info!("wrote SOA report '{}'", config.output_path.display());

    let chart_written = config.chart_path.as_ref().and_then(|path| {
        match write_tbw_chart(path, config.subject, &table, &fits, &thresholds) {
            Ok(()) => Some(path.clone()),
            Err(e) => {
                warn!("chart not written: {e}");
                None
            }
        }
    });

    let mut fit_states_written = Vec::new();
    if let Some(dir) = &config.fit_state_dir {
        for (fit, t) in fits.iter().zip(&thresholds) {
            let path = fit_state_path(dir, config.subject, fit.side);
            let state = build_fit_state(config.subject, fit, t, &table);
            match write_fit_state(&path, &state) {
                Ok(()) => fit_states_written.push(path),
                Err(e) => warn!("{} fit state not written: {e}", fit.side),
            }
        }
    }

    Ok(RunOutput {
        ingest,
        table,
        fits,
        thresholds,
        report,
        chart_written,
        fit_states_written,
    })
}
