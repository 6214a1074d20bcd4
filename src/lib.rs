//! `neo-hazard` library crate.
//!
//! The binary (`neo`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the model, explainer and reporting code stay reusable outside the CLI/TUI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod explain;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
