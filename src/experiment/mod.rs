//! Experiment session planning.
//!
//! Stimulus rendering and audio playback belong to the presentation toolkit;
//! this module owns what the session *decides*:
//!
//! - which SOAs are presented, in which order, with which fixation jitter
//! - how frame counts realize each SOA at the display refresh rate
//! - which response key means "synchronous" for a subject

pub mod responses;
pub mod schedule;

pub use responses::*;
pub use schedule::*;
