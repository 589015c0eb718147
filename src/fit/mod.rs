//! Sigmoid fitting.
//!
//! Responsibilities:
//!
//! - generate the primary and perturbed starting points (`start`)
//! - run Levenberg–Marquardt from each start until one converges (`fitter`)

pub mod fitter;
pub mod start;

pub use fitter::*;
pub use start::*;
