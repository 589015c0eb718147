//! Trial schedules for both experiment phases.
//!
//! Phase A samples a fixed grid of frame offsets to map the synchrony rate
//! curve. Phase B presents each subject's own thresholds (from the phase-A
//! SOA report) plus fixed ±10 ms catch conditions.
//!
//! Timing is expressed in display frames. At the required 100 Hz refresh one
//! frame is 10 ms, so an SOA of `k` frames is logged as `10·k` ms.

use clap::ValueEnum;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::domain::SoaReport;
use crate::error::AppError;
use crate::experiment::responses::is_practice;

/// Required display refresh rate.
pub const FRAME_RATE_HZ: f64 = 100.0;
/// Allowed deviation of the measured refresh rate.
pub const REFRESH_TOLERANCE_HZ: f64 = 0.15;
pub const FRAME_MS: i32 = 10;
/// The audio path lags the display by one frame; every SOA is shifted to compensate.
pub const AUDIO_LAG_FRAMES: i32 = 1;

pub const BLOCKS: usize = 4;
/// Phase-A frame offsets (negative = audio first).
pub const PHASE_A_FRAMES: [i32; 19] = [-30, -25, -20, -15, -10, -8, -5, -2, -1, 0, 1, 2, 5, 8, 10, 15, 20, 25, 30];
/// Repetitions of the phase-A offsets per block.
pub const PHASE_A_REPEATS: usize = 4;
/// Per-block repetitions of the 50% pair and the 95%/catch quadruple in phase B.
pub const PHASE_B_REPEATS_50: usize = 32;
pub const PHASE_B_REPEATS_95: usize = 16;
/// Practice sessions stop after this many trials.
pub const PRACTICE_TRIALS: usize = 5;
/// Inclusive range of fixation frames before each stimulus pair.
pub const FIXATION_JITTER_FRAMES: (u32, u32) = (100, 150);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Synchrony-rate mapping over a fixed SOA grid.
    A,
    /// Main run at the subject's own thresholds.
    B,
}

/// Which stimulus is presented first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StimulusOrder {
    AudioFirst,
    Simultaneous,
    VisualFirst,
}

/// A labelled SOA condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoaCondition {
    pub label: String,
    pub soa_ms: i32,
}

impl SoaCondition {
    fn new(label: impl Into<String>, soa_ms: i32) -> Self {
        Self {
            label: label.into(),
            soa_ms,
        }
    }
}

/// One planned trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTrial {
    pub block: usize,
    /// 1-based index within the block.
    pub trial: usize,
    pub label: String,
    pub soa_ms: i32,
    pub order: StimulusOrder,
    /// Fixation-only frames between the first and the second stimulus.
    pub gap_frames: u32,
    /// Fixation frames before the stimulus pair.
    pub fixation_frames: u32,
}

/// Fail unless the measured refresh rate is within tolerance of the expected one.
pub fn check_refresh_rate(actual_hz: f64, expected_hz: f64, tolerance_hz: f64) -> Result<(), AppError> {
    if actual_hz.is_finite() && (actual_hz - expected_hz).abs() <= tolerance_hz {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "Expected refresh rate: {expected_hz} Hz. Actual rate: {actual_hz} Hz."
        )))
    }
}

/// Convert an SOA in ms to frames; it must be a whole number of frames.
pub fn soa_to_frames(soa_ms: i32) -> Result<i32, AppError> {
    if soa_ms % FRAME_MS != 0 {
        return Err(AppError::config(format!(
            "SOA {soa_ms} ms is not a multiple of the {FRAME_MS} ms frame."
        )));
    }
    Ok(soa_ms / FRAME_MS)
}

/// Stimulus order and gap for an SOA of `frames`, after the audio-lag shift.
///
/// Audio-first trials wait `|corrected|` frames before the flash. Visual-first
/// trials present the flash and wait `corrected - 1` frames before the beep,
/// since the beep is triggered before the next flip.
pub fn presentation(frames: i32) -> (StimulusOrder, u32) {
    let corrected = frames - AUDIO_LAG_FRAMES;
    match corrected {
        c if c < 0 => (StimulusOrder::AudioFirst, c.unsigned_abs()),
        0 => (StimulusOrder::Simultaneous, 0),
        c => (StimulusOrder::VisualFirst, (c - 1) as u32),
    }
}

/// Phase-A conditions for one block (labels are the SOA in ms).
pub fn phase_a_conditions() -> Vec<SoaCondition> {
    let mut out = Vec::with_capacity(PHASE_A_FRAMES.len() * PHASE_A_REPEATS);
    for _ in 0..PHASE_A_REPEATS {
        for &frames in &PHASE_A_FRAMES {
            let soa_ms = frames * FRAME_MS;
            out.push(SoaCondition::new(soa_ms.to_string(), soa_ms));
        }
    }
    out
}

/// Phase-B conditions for one block, from the subject's rounded thresholds.
pub fn phase_b_conditions(report: &SoaReport) -> Result<Vec<SoaCondition>, AppError> {
    let asoa50 = SoaCondition::new("ASOA50r", rounded_ms("ASOA50r", report.asoa50r)?);
    let vsoa50 = SoaCondition::new("VSOA50r", rounded_ms("VSOA50r", report.vsoa50r)?);
    let asoa95 = SoaCondition::new("ASOA95r", rounded_ms("ASOA95r", report.asoa95r)?);
    let vsoa95 = SoaCondition::new("VSOA95r", rounded_ms("VSOA95r", report.vsoa95r)?);
    let a10 = SoaCondition::new("A10", -10);
    let v10 = SoaCondition::new("V10", 10);

    let mut out = Vec::with_capacity(2 * PHASE_B_REPEATS_50 + 4 * PHASE_B_REPEATS_95);
    for _ in 0..PHASE_B_REPEATS_50 {
        out.push(asoa50.clone());
        out.push(vsoa50.clone());
    }
    for _ in 0..PHASE_B_REPEATS_95 {
        out.push(asoa95.clone());
        out.push(a10.clone());
        out.push(v10.clone());
        out.push(vsoa95.clone());
    }
    Ok(out)
}

fn rounded_ms(name: &str, value: f64) -> Result<i32, AppError> {
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > 10_000.0 {
        return Err(AppError::config(format!(
            "SOA report column {name} must be a whole number of ms within ±10000, got {value}."
        )));
    }
    let ms = value as i32;
    soa_to_frames(ms)?;
    Ok(ms)
}

/// Shuffle the block conditions independently for each block.
pub fn build_schedule(conditions: &[SoaCondition], blocks: usize, seed: u64) -> Result<Vec<PlannedTrial>, AppError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(conditions.len() * blocks);

    for block in 1..=blocks {
        let mut order: Vec<&SoaCondition> = conditions.iter().collect();
        order.shuffle(&mut rng);
        for (idx, cond) in order.into_iter().enumerate() {
            let frames = soa_to_frames(cond.soa_ms)?;
            let (stim_order, gap_frames) = presentation(frames);
            out.push(PlannedTrial {
                block,
                trial: idx + 1,
                label: cond.label.clone(),
                soa_ms: cond.soa_ms,
                order: stim_order,
                gap_frames,
                fixation_frames: rng.gen_range(FIXATION_JITTER_FRAMES.0..=FIXATION_JITTER_FRAMES.1),
            });
        }
    }
    Ok(out)
}

/// Full session plan for a subject.
///
/// Phase B requires the subject's SOA report. Practice subjects get only the
/// first few phase-A trials.
pub fn plan_session(
    phase: Phase,
    subject: u32,
    seed: u64,
    report: Option<&SoaReport>,
) -> Result<Vec<PlannedTrial>, AppError> {
    let session_seed = seed ^ u64::from(subject).wrapping_mul(0x0100_0000_01b3);
    match phase {
        Phase::A => {
            let mut plan = build_schedule(&phase_a_conditions(), BLOCKS, session_seed)?;
            if is_practice(subject) {
                plan.truncate(PRACTICE_TRIALS);
            }
            Ok(plan)
        }
        Phase::B => {
            let report = report.ok_or_else(|| AppError::config("Phase B requires the subject's SOA report."))?;
            build_schedule(&phase_b_conditions(report)?, BLOCKS, session_seed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn report() -> SoaReport {
        SoaReport {
            asoa50: -41.0,
            asoa95: -175.0,
            vsoa50: 22.0,
            vsoa95: 168.0,
            asoa50r: -40.0,
            asoa95r: -180.0,
            vsoa50r: 20.0,
            vsoa95r: 170.0,
        }
    }

    #[test]
    fn refresh_rate_tolerance() {
        assert!(check_refresh_rate(100.1, FRAME_RATE_HZ, REFRESH_TOLERANCE_HZ).is_ok());
        assert!(check_refresh_rate(99.8, FRAME_RATE_HZ, REFRESH_TOLERANCE_HZ).is_err());
        assert!(check_refresh_rate(f64::NAN, FRAME_RATE_HZ, REFRESH_TOLERANCE_HZ).is_err());
    }

    #[test]
    fn presentation_compensates_audio_lag() {
        assert_eq!(presentation(-30), (StimulusOrder::AudioFirst, 31));
        assert_eq!(presentation(0), (StimulusOrder::AudioFirst, 1));
        assert_eq!(presentation(1), (StimulusOrder::Simultaneous, 0));
        assert_eq!(presentation(2), (StimulusOrder::VisualFirst, 0));
        assert_eq!(presentation(30), (StimulusOrder::VisualFirst, 28));
    }

    #[test]
    fn phase_a_blocks_contain_each_offset_four_times() {
        let plan = plan_session(Phase::A, 3, 42, None).unwrap();
        assert_eq!(plan.len(), BLOCKS * PHASE_A_FRAMES.len() * PHASE_A_REPEATS);

        for block in 1..=BLOCKS {
            let mut counts: HashMap<i32, usize> = HashMap::new();
            for t in plan.iter().filter(|t| t.block == block) {
                *counts.entry(t.soa_ms).or_default() += 1;
                assert!(t.fixation_frames >= 100 && t.fixation_frames <= 150);
            }
            assert_eq!(counts.len(), PHASE_A_FRAMES.len());
            assert!(counts.values().all(|&n| n == PHASE_A_REPEATS));
            assert!(counts.contains_key(&-300) && counts.contains_key(&300));
        }
    }

    #[test]
    fn schedules_are_reproducible_per_seed() {
        let a = plan_session(Phase::A, 3, 42, None).unwrap();
        let b = plan_session(Phase::A, 3, 42, None).unwrap();
        let c = plan_session(Phase::A, 3, 43, None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn practice_sessions_are_truncated() {
        let plan = plan_session(Phase::A, 901, 42, None).unwrap();
        assert_eq!(plan.len(), PRACTICE_TRIALS);
        assert!(plan.iter().all(|t| t.block == 1));
    }

    #[test]
    fn phase_b_uses_rounded_thresholds_and_catch_trials() {
        let plan = plan_session(Phase::B, 5, 42, Some(&report())).unwrap();
        let per_block = 2 * PHASE_B_REPEATS_50 + 4 * PHASE_B_REPEATS_95;
        assert_eq!(plan.len(), BLOCKS * per_block);

        let block1: Vec<&PlannedTrial> = plan.iter().filter(|t| t.block == 1).collect();
        let count = |label: &str| block1.iter().filter(|t| t.label == label).count();
        assert_eq!(count("ASOA50r"), 32);
        assert_eq!(count("VSOA50r"), 32);
        assert_eq!(count("ASOA95r"), 16);
        assert_eq!(count("A10"), 16);
        assert_eq!(count("V10"), 16);
        assert_eq!(count("VSOA95r"), 16);
        assert!(block1.iter().any(|t| t.soa_ms == -180));
    }

    #[test]
    fn phase_b_requires_a_report_with_whole_frames() {
        assert!(plan_session(Phase::B, 5, 42, None).is_err());

        let mut bad = report();
        bad.vsoa95r = 165.0;
        assert!(plan_session(Phase::B, 5, 42, Some(&bad)).is_err());
    }
}
