//! Read/write model artifact JSON files, guarded by a type trust list.
//!
//! A model artifact is a JSON document:
//!
//! ```text
//! {
//!   "format": "neo-model",
//!   "version": 1,
//!   "manifest": ["sklearn.ensemble._forest.RandomForestClassifier", ...],
//!   "feature_names": ["absolute_magnitude", ...],
//!   "classes": [0, 1],
//!   "model": { "kind": "random_forest", ... }
//! }
//! ```
//!
//! Loading is two-phase. The header (format, version, manifest) is read on its
//! own and every manifest entry is checked against the trust list. Only when no
//! untrusted type remains is the model body deserialized and validated.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::FEATURE_NAMES;
use crate::error::AppError;
use crate::models::ModelBody;

pub const MODEL_FORMAT: &str = "neo-model";
pub const MODEL_VERSION: u32 = 1;

pub const TYPE_RANDOM_FOREST: &str = "sklearn.ensemble._forest.RandomForestClassifier";
pub const TYPE_DECISION_TREE: &str = "sklearn.tree._classes.DecisionTreeClassifier";
pub const TYPE_TREE: &str = "sklearn.tree._tree.Tree";
pub const TYPE_LOGISTIC: &str = "sklearn.linear_model._logistic.LogisticRegression";

/// Types this crate knows how to evaluate, trusted without user opt-in.
pub const DEFAULT_TRUSTED_TYPES: [&str; 8] = [
    TYPE_RANDOM_FOREST,
    TYPE_DECISION_TREE,
    TYPE_TREE,
    TYPE_LOGISTIC,
    "numpy.ndarray",
    "numpy.dtype",
    "builtins.dict",
    "builtins.list",
];

/// Set of type names allowed to appear in a model manifest.
#[derive(Debug, Clone)]
pub struct TrustList {
    types: BTreeSet<String>,
}

impl Default for TrustList {
    fn default() -> Self {
        Self {
            types: DEFAULT_TRUSTED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TrustList {
    /// Default list plus explicitly trusted extras (blank entries are ignored).
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for ty in extra {
            let ty = ty.as_ref().trim();
            if !ty.is_empty() {
                list.types.insert(ty.to_string());
            }
        }
        list
    }

    pub fn contains(&self, ty: &str) -> bool {
        self.types.contains(ty)
    }
}

/// Artifact header, readable without touching the model body.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    pub format: String,
    pub version: u32,
    pub manifest: Vec<String>,
}

impl ModelManifest {
    /// Manifest entries missing from `trust`, sorted and deduplicated.
    pub fn untrusted_types(&self, trust: &TrustList) -> Vec<String> {
        self.manifest
            .iter()
            .filter(|ty| !trust.contains(ty))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A complete, validated model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub version: u32,
    pub manifest: Vec<String>,
    pub feature_names: Vec<String>,
    pub classes: Vec<u8>,
    pub model: ModelBody,
}

impl ModelArtifact {
    /// Wrap a model body with a matching header and manifest.
    pub fn new(model: ModelBody) -> Self {
        let mut manifest: Vec<String> = declared_types(&model).iter().map(|s| s.to_string()).collect();
        manifest.push("numpy.ndarray".to_string());
        Self {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            manifest,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            classes: vec![0, 1],
            model,
        }
    }
}

/// Types a model body must declare in its manifest.
fn declared_types(model: &ModelBody) -> &'static [&'static str] {
    match model {
        ModelBody::RandomForest(_) => &[TYPE_RANDOM_FOREST, TYPE_DECISION_TREE, TYPE_TREE],
        ModelBody::DecisionTree(_) => &[TYPE_DECISION_TREE, TYPE_TREE],
        ModelBody::LogisticRegression(_) => &[TYPE_LOGISTIC],
    }
}

/// Read only the header of a model artifact.
pub fn read_manifest(path: &Path) -> Result<ModelManifest, AppError> {
    let text = read_text(path)?;
    parse_manifest(&text)
}

/// Load a model artifact, refusing it if the manifest names an untrusted type.
pub fn load_model(path: &Path, trust: &TrustList) -> Result<ModelArtifact, AppError> {
    let text = read_text(path)?;
    let header = parse_manifest(&text)?;

    let untrusted = header.untrusted_types(trust);
    if !untrusted.is_empty() {
        warn!(path = %path.display(), ?untrusted, "refusing model with untrusted types");
        return Err(AppError::refused(format!(
            "Refusing to load model '{}': untrusted types [{}]. Inspect them with `neo inspect` and pass `--trust <TYPE>` only if you trust them.",
            path.display(),
            untrusted.join(", ")
        )));
    }
    debug!(path = %path.display(), types = header.manifest.len(), "model manifest trusted");

    let artifact: ModelArtifact = serde_json::from_str(&text)
        .map_err(|e| AppError::input(format!("Invalid model JSON '{}': {e}", path.display())))?;
    validate_artifact(&artifact)
        .map_err(|e| AppError::refused(format!("Invalid model '{}': {e}", path.display())))?;

    Ok(artifact)
}

fn read_text(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to open model file '{}': {e}", path.display())))
}

fn parse_manifest(text: &str) -> Result<ModelManifest, AppError> {
    let header: ModelManifest = serde_json::from_str(text)
        .map_err(|e| AppError::input(format!("Invalid model header: {e}")))?;
    if header.format != MODEL_FORMAT {
        return Err(AppError::input(format!(
            "Unsupported model format '{}' (expected '{MODEL_FORMAT}').",
            header.format
        )));
    }
    if header.version != MODEL_VERSION {
        return Err(AppError::input(format!(
            "Unsupported model version {} (expected {MODEL_VERSION}).",
            header.version
        )));
    }
    Ok(header)
}

fn validate_artifact(artifact: &ModelArtifact) -> Result<(), String> {
    if artifact.feature_names.len() != FEATURE_NAMES.len()
        || artifact
            .feature_names
            .iter()
            .zip(FEATURE_NAMES.iter())
            .any(|(a, b)| a != b)
    {
        return Err(format!(
            "feature names {:?} do not match expected {:?}",
            artifact.feature_names, FEATURE_NAMES
        ));
    }
    if artifact.classes != [0, 1] {
        return Err(format!("classes {:?} must be [0, 1]", artifact.classes));
    }
    for ty in declared_types(&artifact.model) {
        if !artifact.manifest.iter().any(|m| m == ty) {
            return Err(format!("manifest does not declare `{ty}` used by the model body"));
        }
    }
    artifact.model.validate()
}
