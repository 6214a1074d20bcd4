//! Local explanation of a single prediction.
//!
//! - `discretize`: quartile bins fitted on the reference dataset
//! - `sample`: perturbed neighborhood + kernel weights
//! - `explainer`: feature selection and the weighted ridge surrogate

pub mod discretize;
pub mod explainer;
pub mod sample;

pub use discretize::QuartileDiscretizer;
pub use explainer::TabularExplainer;
