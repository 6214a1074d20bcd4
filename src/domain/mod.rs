//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the feature form and model-space row (`FeatureInput`, `FeatureVector`)
//! - classifier outputs (`HazardClass`, `Prediction`)
//! - explainer settings and outputs (`ExplainConfig`, `Explanation`)

pub mod types;

pub use types::*;
