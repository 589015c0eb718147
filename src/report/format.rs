//! Formatted terminal output.
//!
//! Formatting lives in one place so the fitting code stays clean and output
//! changes are localized.

use crate::domain::{RateTable, Side, SideFit, SideThresholds, SoaReport};
use crate::experiment::{PlannedTrial, StimulusOrder};
use crate::io::IngestedTrials;

/// One-paragraph account of what ingest kept and skipped.
pub fn format_ingest_summary(ingest: &IngestedTrials) -> String {
    let mut out = format!(
        "Read {} trial rows, used {} (responses from {}; {} without a response).\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.source.describe(),
        ingest.missing_responses(),
    );
    if !ingest.row_errors.is_empty() {
        out.push_str(&format!("Skipped {} row(s):\n", ingest.row_errors.len()));
        for err in ingest.row_errors.iter().take(10) {
            out.push_str(&format!("  line {}: {}\n", err.line, err.message));
        }
        if ingest.row_errors.len() > 10 {
            out.push_str(&format!("  ... and {} more\n", ingest.row_errors.len() - 10));
        }
    }
    out
}

/// Per-SOA counts and rates.
pub fn format_rate_table(table: &RateTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>10} {:>8} {:>8} {:>10}\n", "SOA (ms)", "sync", "total", "sync_rate"));
    out.push_str(&format!("{:->10} {:->8} {:->8} {:->10}\n", "", "", "", ""));
    for row in table.rows() {
        out.push_str(&format!(
            "{:>10.1} {:>8} {:>8} {:>10.4}\n",
            row.soa, row.count_sync, row.count_total, row.sync_rate
        ));
    }
    out.push_str(&format!(
        "{} SOA values, {} trials\n",
        table.len(),
        table.total_trials()
    ));
    out
}

/// Fit diagnostics and thresholds for both sides.
pub fn format_run_summary(
    subject: u32,
    fits: &[SideFit],
    thresholds: &[SideThresholds],
    report: &SoaReport,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== tbw - temporal binding window fit (subject {subject}) ===\n"));

    out.push_str("\nSigmoid fits (rate = a / (1 + exp(-b (SOA - c)))):\n");
    for fit in fits {
        out.push_str(&format!(
            "  {:<24} a={:.4} b={:.5} c={:.2}  SSE={:.3e} RMSE={:.4} n={} iter={}{}\n",
            fit.side.display_name(),
            fit.params.a,
            fit.params.b,
            fit.params.c,
            fit.quality.sse,
            fit.quality.rmse,
            fit.quality.n,
            fit.quality.iterations,
            retry_note(fit),
        ));
    }

    out.push_str("\nThresholds (ms):\n");
    for t in thresholds {
        let prefix = t.side.threshold_prefix();
        out.push_str(&format!(
            "  {prefix}50 = {:>9.2}   {prefix}95 = {:>9.2}\n",
            t.soa50, t.soa95
        ));
    }

    out.push('\n');
    out.push_str(&format_report(report));
    out
}

/// The persisted report row as an aligned two-line table.
pub fn format_report(report: &SoaReport) -> String {
    let columns = report.columns();
    let header: Vec<String> = columns.iter().map(|(name, _)| format!("{name:>9}")).collect();
    let values: Vec<String> = columns.iter().map(|(_, v)| format!("{v:>9.2}")).collect();
    format!("{}\n{}\n", header.join(" "), values.join(" "))
}

fn retry_note(fit: &SideFit) -> String {
    if fit.quality.attempts > 1 {
        format!(" (converged on attempt {})", fit.quality.attempts)
    } else {
        String::new()
    }
}

/// Planned trials, one per line.
pub fn format_schedule(plan: &[PlannedTrial]) -> String {
    let mut out = format!(
        "{:>5} {:>5} {:>8} {:>8} {:>13} {:>4} {:>8}\n",
        "block", "trial", "label", "SOA", "order", "gap", "fixation"
    );
    for t in plan {
        let order = match t.order {
            StimulusOrder::AudioFirst => "audio-first",
            StimulusOrder::Simultaneous => "simultaneous",
            StimulusOrder::VisualFirst => "visual-first",
        };
        out.push_str(&format!(
            "{:>5} {:>5} {:>8} {:>8} {:>13} {:>4} {:>8}\n",
            t.block, t.trial, t.label, t.soa_ms, order, t.gap_frames, t.fixation_frames
        ));
    }
    out.push_str(&format!("{} trials\n", plan.len()));
    out
}

/// One-line description of a side's thresholds, used in plot titles.
pub fn threshold_caption(side: Side, soa50: f64, soa95: f64) -> String {
    let prefix = side.threshold_prefix();
    format!("{prefix}50={soa50:.2} {prefix}95={soa95:.2}")
}
