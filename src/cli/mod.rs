//! Command-line parsing for the TBW fitter.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `app` turns these types into a `FitConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Side;
use crate::experiment::Phase;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tbw", version, about = "Temporal binding window fitter for synchrony judgments")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit both sides, compute thresholds, and write the SOA report.
    Fit(FitArgs),
    /// Print the per-SOA rate table only.
    Rates(RatesArgs),
    /// Print or write a session's trial schedule.
    Schedule(ScheduleArgs),
    /// Write a synthetic phase-A trial file for a simulated observer.
    Simulate(SimulateArgs),
    /// Plot a saved fit state in the terminal.
    Plot(PlotArgs),
}

/// Where a subject's trial data lives.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Subject ID.
    #[arg(short = 's', long)]
    pub subject: u32,

    /// Data root (default: `TBW_DATA_DIR`, else `data`).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Trial CSV (default: `<root>/msi_a/msi_a_sub<ID>.csv`).
    #[arg(long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Name of the SOA column.
    #[arg(long, default_value = "SOA")]
    pub soa_column: String,

    /// Name of a column holding sync/async labels (default: `resp_recode`, else recoded `resp`).
    #[arg(long)]
    pub response_column: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// SOA report destination (default: `<root>/SOAs/msi_a_sub<ID>_SOAs.csv`).
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Do not write the SVG chart.
    #[arg(long)]
    pub no_chart: bool,

    /// Do not write per-side fit state JSON.
    #[arg(long)]
    pub no_fit_state: bool,

    /// Perturbed restarts per side after the primary start fails.
    #[arg(long, default_value_t = 8)]
    pub retries: usize,

    /// Seed for the perturbed restarts.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Optimizer iteration cap per attempt.
    #[arg(long, default_value_t = 500)]
    pub max_iterations: usize,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct RatesArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ScheduleArgs {
    /// Subject ID.
    #[arg(short = 's', long)]
    pub subject: u32,

    /// Experiment phase.
    #[arg(long, value_enum)]
    pub phase: Phase,

    /// Data root (phase B reads the subject's SOA report from it).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// SOA report for phase B (default: `<root>/SOAs/msi_a_sub<ID>_SOAs.csv`).
    #[arg(long, value_name = "CSV")]
    pub soa_report: Option<PathBuf>,

    /// Shuffle seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write the schedule as CSV instead of printing it.
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Subject ID (also selects the key counterbalance).
    #[arg(short = 's', long)]
    pub subject: u32,

    /// Data root.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Destination (default: `<root>/msi_a/msi_a_sub<ID>.csv`).
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = 0.9)]
    pub left_a: f64,
    #[arg(long, default_value_t = 0.03)]
    pub left_b: f64,
    #[arg(long, default_value_t = -100.0, allow_hyphen_values = true)]
    pub left_c: f64,
    #[arg(long, default_value_t = 0.85)]
    pub right_a: f64,
    #[arg(long, default_value_t = -0.025, allow_hyphen_values = true)]
    pub right_b: f64,
    #[arg(long, default_value_t = 120.0)]
    pub right_c: f64,

    /// Probability of a trial without a response.
    #[arg(long, default_value_t = 0.02)]
    pub lapse: f64,

    /// Session seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Fit state JSON written by `tbw fit`.
    #[arg(long, value_name = "JSON")]
    pub fit_state: Option<PathBuf>,

    /// Subject whose saved fit to plot (with `--side`).
    #[arg(short = 's', long, requires = "side")]
    pub subject: Option<u32>,

    /// Side to plot from the data root's fit results.
    #[arg(long, value_enum)]
    pub side: Option<Side>,

    /// Data root.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
