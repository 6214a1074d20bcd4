//! Reporting utilities: formatted terminal output for predictions,
//! explanations and model inspection.

pub mod format;

pub use format::*;
