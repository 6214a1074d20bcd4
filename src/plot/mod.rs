//! Terminal charts.

pub mod ascii;

pub use ascii::render_contribution_bars;
