//! `tbw-fit` library crate.
//!
//! The binary (`tbw`) is a thin wrapper around this library so that:
//!
//! - the analysis is testable without spawning processes
//! - the fitter and report types are reusable from other tools

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod experiment;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
