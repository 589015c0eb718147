//! Plotting.
//!
//! - `ascii`: deterministic terminal plot
//! - `chart`: SVG chart written next to the results

pub mod ascii;
pub mod chart;

pub use ascii::*;
pub use chart::*;
