//! Input/output helpers.
//!
//! - data-root path layout (`layout`)
//! - trial CSV ingest + validation (`ingest`)
//! - SOA report CSV write/read (`export`)
//! - per-side fit state JSON read/write (`fit_state`)
//! - trial log CSVs (`trial_log`)

pub mod export;
pub mod fit_state;
pub mod ingest;
pub mod layout;
pub mod trial_log;

pub use export::*;
pub use fit_state::*;
pub use ingest::*;
pub use layout::*;
pub use trial_log::*;
