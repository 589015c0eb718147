//! Psychometric model implementations.
//!
//! Models are small, pure functions so that fitting and reporting code can stay
//! generic over the parameters.

pub mod sigmoid;

pub use sigmoid::*;
