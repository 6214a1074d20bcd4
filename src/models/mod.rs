//! Classifier implementations.
//!
//! Models are plain data (deserialized from the artifact) plus pure evaluation
//! functions, so the explainer can stay generic over `Classifier`.

pub mod model;

pub use model::*;
