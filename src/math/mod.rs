//! Mathematical utilities: descriptive statistics and weighted ridge regression.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
