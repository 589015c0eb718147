//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main that parses the CLI,
//! resolves paths against the data root, runs the pipeline and prints results.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, PlotArgs, RatesArgs, ScheduleArgs, SimulateArgs};
use crate::data::{simulate_session, ObserverModel};
use crate::domain::{FitConfig, SigmoidParams};
use crate::error::AppError;
use crate::experiment::{plan_session, Phase};
use crate::io::{
    fit_state_path, read_fit_state, read_soa_report, write_schedule_csv, write_trials_csv, DataLayout,
    TrialLog,
};
use crate::plot::{render_fit_state, render_tbw_plot};
use crate::report::{format_ingest_summary, format_rate_table, format_run_summary, format_schedule, threshold_caption};

pub mod pipeline;

/// Entry point for the `tbw` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Rates(args) => handle_rates(args),
        Command::Schedule(args) => handle_schedule(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let layout = DataLayout::resolve(args.input.data_dir.as_deref());
    let config = fit_config_from_args(&args, &layout);
    let run = pipeline::run_fit(&config)?;

    println!("{}", format_ingest_summary(&run.ingest));
    println!("{}", format_rate_table(&run.table));
    println!(
        "{}",
        format_run_summary(config.subject, &run.fits, &run.thresholds, &run.report)
    );

    if config.plot {
        let plot = render_tbw_plot(
            &run.table,
            &run.fits,
            &run.thresholds,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    println!("Wrote {}", config.output_path.display());
    if let Some(path) = &run.chart_written {
        println!("Wrote {}", path.display());
    }
    for path in &run.fit_states_written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_rates(args: RatesArgs) -> Result<(), AppError> {
    let layout = DataLayout::resolve(args.input.data_dir.as_deref());
    let input = args.input.input.clone().unwrap_or_else(|| layout.trials(args.input.subject));
    let (ingest, table) = pipeline::load_rate_table(
        &input,
        &args.input.soa_column,
        args.input.response_column.as_deref(),
        args.input.subject,
    )?;

    println!("{}", format_ingest_summary(&ingest));
    println!("{}", format_rate_table(&table));
    Ok(())
}

fn handle_schedule(args: ScheduleArgs) -> Result<(), AppError> {
    let report = match args.phase {
        Phase::A => None,
        Phase::B => {
            let layout = DataLayout::resolve(args.data_dir.as_deref());
            let path = args.soa_report.clone().unwrap_or_else(|| layout.soa_report(args.subject));
            println!("{}", soa_file_notice(&path)?);
            Some(read_soa_report(&path)?)
        }
    };

    let plan = plan_session(args.phase, args.subject, args.seed, report.as_ref())?;
    match &args.out {
        Some(path) => {
            write_schedule_csv(path, &plan)?;
            println!("Wrote {} planned trials to {}", plan.len(), path.display());
        }
        None => println!("{}", format_schedule(&plan)),
    }
    Ok(())
}

/// Phase B depends on phase A's output; show which file (and how fresh) it is.
fn soa_file_notice(path: &Path) -> Result<String, AppError> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| AppError::config(format!("SOA file '{}' not found: {e}", path.display())))?;
    let modified: DateTime<Local> = modified.into();
    Ok(format!(
        "Using SOA file {} (last modified {})",
        path.display(),
        modified.format("%Y-%m-%d %H:%M:%S")
    ))
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let layout = DataLayout::resolve(args.data_dir.as_deref());
    let path = args.out.clone().unwrap_or_else(|| layout.trials(args.subject));
    let model = ObserverModel {
        left: SigmoidParams::new(args.left_a, args.left_b, args.left_c),
        right: SigmoidParams::new(args.right_a, args.right_b, args.right_c),
        lapse: args.lapse,
        ..ObserverModel::default()
    };

    let rows = simulate_session(&model, args.subject, args.seed)?;
    write_trials_csv(&path, &rows)?;
    println!("Wrote {} simulated trials to {}", rows.len(), path.display());

    // Mirror the running experiment, which appends every trial to the session log.
    let mut log = TrialLog::open(&layout.trial_log(args.subject))?;
    for row in &rows {
        log.append(row)?;
    }
    println!("Appended to {}", log.path().display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let path = plot_source(&args)?;
    let state = read_fit_state(&path)?;

    println!("{}", render_fit_state(&state, args.width, args.height));
    let t = &state.thresholds;
    println!("{}", threshold_caption(t.side, t.soa50, t.soa95));
    Ok(())
}

fn plot_source(args: &PlotArgs) -> Result<PathBuf, AppError> {
    if let Some(path) = &args.fit_state {
        return Ok(path.clone());
    }
    match (args.subject, args.side) {
        (Some(subject), Some(side)) => {
            let layout = DataLayout::resolve(args.data_dir.as_deref());
            Ok(fit_state_path(&layout.fit_state_dir(), subject, side))
        }
        _ => Err(AppError::config("Pass `--fit-state <JSON>` or `--subject <ID> --side <SIDE>`.")),
    }
}

pub fn fit_config_from_args(args: &FitArgs, layout: &DataLayout) -> FitConfig {
    let subject = args.input.subject;
    FitConfig {
        subject,
        input_path: args.input.input.clone().unwrap_or_else(|| layout.trials(subject)),
        output_path: args.output.clone().unwrap_or_else(|| layout.soa_report(subject)),
        chart_path: (!args.no_chart).then(|| layout.chart(subject)),
        fit_state_dir: (!args.no_fit_state).then(|| layout.fit_state_dir()),
        soa_column: args.input.soa_column.clone(),
        response_column: args.input.response_column.clone(),
        max_iterations: args.max_iterations,
        retries: args.retries,
        seed: args.seed,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_config_uses_layout_defaults() {
        let cli = Cli::parse_from(["tbw", "fit", "-s", "12", "--no-chart"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let layout = DataLayout::new("/data");
        let config = fit_config_from_args(&args, &layout);
        assert_eq!(config.input_path, PathBuf::from("/data/msi_a/msi_a_sub12.csv"));
        assert_eq!(config.output_path, PathBuf::from("/data/SOAs/msi_a_sub12_SOAs.csv"));
        assert_eq!(config.chart_path, None);
        assert_eq!(config.fit_state_dir, Some(PathBuf::from("/data/fit_results")));
    }

    #[test]
    fn plot_needs_a_source() {
        let cli = Cli::parse_from(["tbw", "plot"]);
        let Command::Plot(args) = cli.command else {
            panic!("expected plot");
        };
        assert!(plot_source(&args).is_err());
    }

    #[test]
    fn missing_soa_file_is_a_configuration_error() {
        let err = soa_file_notice(Path::new("/nonexistent/tbw/SOAs.csv")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
