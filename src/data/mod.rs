//! Trial data processing.
//!
//! - `rates`: aggregate trial records into a per-SOA rate table
//! - `simulate`: synthetic observer for generating trial files

pub mod rates;
pub mod simulate;

pub use rates::*;
pub use simulate::*;
