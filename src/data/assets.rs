//! Asset paths and the loaded session.
//!
//! Configuration is layered:
//! - built-in defaults (`data/smote_data.csv`, `assets/neo_rf.json`)
//! - `.env` / environment (`NEO_DATA_PATH`, `NEO_MODEL_PATH`, `NEO_TRUSTED_TYPES`)
//! - CLI flags
//!
//! A `Session` is everything loaded from disk. It is built once and then only
//! borrowed, so every prediction in a process sees the same model and data.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::explain::TabularExplainer;
use crate::io::ingest::{IngestedData, load_reference_dataset};
use crate::io::model_file::{ModelArtifact, TrustList, load_model};

pub const DEFAULT_DATA_PATH: &str = "data/smote_data.csv";
pub const DEFAULT_MODEL_PATH: &str = "assets/neo_rf.json";

pub const ENV_DATA_PATH: &str = "NEO_DATA_PATH";
pub const ENV_MODEL_PATH: &str = "NEO_MODEL_PATH";
/// Comma-separated extra trusted type names.
pub const ENV_TRUSTED_TYPES: &str = "NEO_TRUSTED_TYPES";

/// Where to find the model and the reference dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    /// Types trusted on top of the built-in list.
    pub trusted_types: Vec<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            trusted_types: Vec::new(),
        }
    }
}

impl AssetConfig {
    /// Defaults overlaid with `.env` and process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(p) = lookup(ENV_DATA_PATH).filter(|s| !s.trim().is_empty()) {
            config.data_path = PathBuf::from(p.trim());
        }
        if let Some(p) = lookup(ENV_MODEL_PATH).filter(|s| !s.trim().is_empty()) {
            config.model_path = PathBuf::from(p.trim());
        }
        if let Some(list) = lookup(ENV_TRUSTED_TYPES) {
            config.trusted_types = split_types(&list);
        }
        config
    }

    /// Apply CLI overrides. Trusted types from flags are added, not replaced.
    pub fn with_overrides(mut self, data: Option<&Path>, model: Option<&Path>, trust: &[String]) -> Self {
        if let Some(p) = data {
            self.data_path = p.to_path_buf();
        }
        if let Some(p) = model {
            self.model_path = p.to_path_buf();
        }
        for ty in trust.iter().flat_map(|t| split_types(t)) {
            if !self.trusted_types.contains(&ty) {
                self.trusted_types.push(ty);
            }
        }
        self
    }

    pub fn trust_list(&self) -> TrustList {
        TrustList::with_extra(&self.trusted_types)
    }
}

fn split_types(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Model, reference data and the fitted explainer for one process.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: AssetConfig,
    pub model: ModelArtifact,
    pub ingest: IngestedData,
    pub explainer: TabularExplainer,
}

impl Session {
    /// Load both assets. The model is checked against the trust list first.
    pub fn load(config: &AssetConfig) -> Result<Self, AppError> {
        let model = load_model(&config.model_path, &config.trust_list())?;
        info!(
            path = %config.model_path.display(),
            model = %model.model.display_name(),
            "loaded model"
        );
        let ingest = load_reference_dataset(&config.data_path)?;
        Self::from_parts(config.clone(), model, ingest)
    }

    pub fn from_parts(config: AssetConfig, model: ModelArtifact, ingest: IngestedData) -> Result<Self, AppError> {
        let explainer = TabularExplainer::new(&ingest.dataset)?;
        Ok(Self {
            config,
            model,
            ingest,
            explainer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::model_file::tests::write_model_json;
    use crate::models::model::tests::sample_forest;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults_and_flags_override_env() {
        let env: HashMap<&str, &str> = [
            (ENV_MODEL_PATH, "/srv/neo/model.json"),
            (ENV_TRUSTED_TYPES, " custom.A, ,custom.B"),
        ]
        .into_iter()
        .collect();
        let config = AssetConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.model_path, PathBuf::from("/srv/neo/model.json"));
        assert_eq!(config.trusted_types, vec!["custom.A", "custom.B"]);

        let config = config.with_overrides(
            Some(Path::new("other.csv")),
            None,
            &["custom.B".to_string(), "custom.C".to_string()],
        );
        assert_eq!(config.data_path, PathBuf::from("other.csv"));
        assert_eq!(config.model_path, PathBuf::from("/srv/neo/model.json"));
        assert_eq!(config.trusted_types, vec!["custom.A", "custom.B", "custom.C"]);
        assert!(config.trust_list().contains("custom.C"));
    }

    #[test]
    fn session_loads_model_and_dataset() {
        let dir = std::env::temp_dir().join(format!("neo_session_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let model_path = dir.join("model.json");
        let data_path = dir.join("data.csv");

        write_model_json(&model_path, &ModelArtifact::new(sample_forest()));
        let mut csv = String::from(",absolute_magnitude,estimated_diameter_max,relative_velocity,miss_distance,is_hazardous\n");
        for i in 0..20 {
            let v = i as f64;
            csv.push_str(&format!("{i},{},{},{},{},{}\n", 20.0 + v * 0.3, 0.05 + v * 0.02, 10000.0 + v * 1500.0, 15.0 + v * 0.2, i % 2));
        }
        std::fs::write(&data_path, csv).unwrap();

        let config = AssetConfig::default().with_overrides(Some(&data_path), Some(&model_path), &[]);
        let session = Session::load(&config).unwrap();
        assert_eq!(session.ingest.rows_used, 20);
        assert_eq!(session.ingest.stats.n_hazardous, Some(10));
        assert_eq!(session.explainer.discretizer().features.len(), 4);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn shipped_assets_load_and_predict() {
        // `cargo test` runs from the package root, where the default paths resolve.
        let session = Session::load(&AssetConfig::default()).unwrap();
        assert_eq!(session.ingest.rows_used, 600);
        assert!(session.ingest.row_errors.is_empty());
        assert_eq!(session.explainer.discretizer().features.len(), 4);

        let config = crate::domain::ExplainConfig {
            num_samples: 500,
            ..crate::domain::ExplainConfig::default()
        };
        let output =
            crate::app::pipeline::run_prediction(&session, &crate::domain::FeatureInput::default(), &config).unwrap();
        let [p0, p1] = output.prediction.probabilities;
        assert!((p0 + p1 - 1.0).abs() < 1e-9);
        assert_eq!(output.explanation.features.len(), 4);
    }
}
