//! Input/output helpers.
//!
//! - reference dataset CSV ingest + validation (`ingest`)
//! - model artifact JSON with trust-list checks (`model_file`)
//! - HTML/JSON exports of a prediction (`export`)

pub mod export;
pub mod ingest;
pub mod model_file;

pub use export::*;
pub use ingest::*;
pub use model_file::*;
