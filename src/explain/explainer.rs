//! Local surrogate explanations for a single prediction.
//!
//! Given an instance and a fitted classifier, we:
//! - sample a neighborhood around the instance (see `sample`)
//! - score every neighbor with the classifier
//! - weight neighbors by an exponential kernel on their binary distance
//! - pick at most `num_features` features
//! - fit a weighted ridge surrogate on the binary columns of those features
//!
//! The surrogate coefficients are the reported feature weights. A positive
//! weight means "the instance being in this bin pushes toward the explained
//! class".

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::domain::{
    ExplainConfig, Explanation, FEATURE_COUNT, FeatureSelection, FeatureVector, FeatureWeight, HazardClass,
};
use crate::error::AppError;
use crate::explain::discretize::QuartileDiscretizer;
use crate::explain::sample::{default_kernel_width, distances_from_instance, kernel_weights, sample_neighborhood};
use crate::io::ingest::ReferenceDataset;
use crate::math::{LinearFit, fit_weighted_ridge, weighted_r2};
use crate::models::{Classifier, predict_proba_batch};

/// Ridge strength of the final surrogate.
const SURROGATE_ALPHA: f64 = 1.0;
/// Ridge strength used to rank features for `HighestWeights`.
const RANKING_ALPHA: f64 = 0.01;
/// `Auto` uses forward selection up to this many features.
const FORWARD_SELECTION_MAX: usize = 6;

/// Explainer bound to one reference dataset. Built once, reused per request.
#[derive(Debug, Clone)]
pub struct TabularExplainer {
    discretizer: QuartileDiscretizer,
    feature_names: Vec<String>,
}

impl TabularExplainer {
    pub fn new(dataset: &ReferenceDataset) -> Result<Self, AppError> {
        let discretizer = QuartileDiscretizer::fit(dataset)?;
        Ok(Self {
            discretizer,
            feature_names: dataset.feature_names.clone(),
        })
    }

    pub fn discretizer(&self) -> &QuartileDiscretizer {
        &self.discretizer
    }

    /// Explain `model`'s probability of `class` at `instance`.
    pub fn explain<C: Classifier + ?Sized>(
        &self,
        model: &C,
        instance: &FeatureVector,
        class: HazardClass,
        config: &ExplainConfig,
    ) -> Result<Explanation, AppError> {
        if config.num_features == 0 {
            return Err(AppError::input("num_features must be at least 1."));
        }
        let num_features = config.num_features.min(FEATURE_COUNT);

        let width = match config.kernel_width {
            Some(w) if w.is_finite() && w > 0.0 => w,
            Some(w) => return Err(AppError::input(format!("Invalid kernel width {w}."))),
            None => default_kernel_width(FEATURE_COUNT),
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let neighborhood = sample_neighborhood(instance, &self.discretizer, config.num_samples, &mut rng)?;

        let distances = distances_from_instance(&neighborhood.binary);
        let weights = DVector::from_vec(kernel_weights(&distances, width));

        let proba = predict_proba_batch(model, &neighborhood.inverse);
        if proba.iter().flatten().any(|p| !p.is_finite()) {
            return Err(AppError::compute("Classifier returned non-finite probabilities."));
        }
        let target = DVector::from_iterator(proba.len(), proba.iter().map(|p| p[class.index()]));

        let selected = select_features(
            &neighborhood.binary,
            &target,
            &weights,
            num_features,
            config.feature_selection,
        );
        debug!(?selected, samples = config.num_samples, width, "explainer feature selection");

        let x = neighborhood.binary.select_columns(selected.iter());
        let fit = fit_weighted_ridge(&x, &target, &weights, SURROGATE_ALPHA)
            .ok_or_else(|| AppError::compute("Local surrogate regression failed."))?;

        let score = weighted_r2(&target, &fit.predict(&x), &weights);
        let row0: Vec<f64> = x.row(0).iter().copied().collect();
        let local_prediction = fit.predict_row(&row0);

        let bins = self.discretizer.discretize(instance);
        let mut features: Vec<FeatureWeight> = selected
            .iter()
            .zip(fit.coef.iter())
            .map(|(&j, &weight)| FeatureWeight {
                feature_index: j,
                feature: self.feature_names[j].clone(),
                condition: self.discretizer.condition(j, bins[j]).to_string(),
                value: instance[j],
                weight,
            })
            .collect();
        features.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.feature_index.cmp(&b.feature_index))
        });

        Ok(Explanation {
            class,
            intercept: fit.intercept,
            local_prediction,
            score,
            predict_proba: proba[0],
            num_samples: config.num_samples,
            features,
        })
    }
}

fn select_features(
    binary: &DMatrix<f64>,
    target: &DVector<f64>,
    weights: &DVector<f64>,
    k: usize,
    method: FeatureSelection,
) -> Vec<usize> {
    let all: Vec<usize> = (0..binary.ncols()).collect();
    match method {
        FeatureSelection::None => all,
        FeatureSelection::Forward => forward_selection(binary, target, weights, k),
        FeatureSelection::HighestWeights => highest_weights(binary, target, weights, k),
        FeatureSelection::Auto if k <= FORWARD_SELECTION_MAX => forward_selection(binary, target, weights, k),
        FeatureSelection::Auto => highest_weights(binary, target, weights, k),
    }
}

/// Greedily add the feature that most improves the weighted R².
fn forward_selection(binary: &DMatrix<f64>, target: &DVector<f64>, weights: &DVector<f64>, k: usize) -> Vec<usize> {
    let mut used: Vec<usize> = Vec::with_capacity(k);
    for _ in 0..k.min(binary.ncols()) {
        let mut best_score = -1e8;
        let mut best = None;
        for j in (0..binary.ncols()).filter(|j| !used.contains(j)) {
            let mut cols = used.clone();
            cols.push(j);
            let x = binary.select_columns(cols.iter());
            let Some(fit) = fit_weighted_ridge(&x, target, weights, 0.0) else {
                continue;
            };
            let score = weighted_r2(target, &fit.predict(&x), weights);
            if score > best_score {
                best_score = score;
                best = Some(j);
            }
        }
        match best {
            Some(j) => used.push(j),
            None => break,
        }
    }
    used
}

/// Rank features by `|coef_j * x0_j|` of a lightly penalized fit on all features.
fn highest_weights(binary: &DMatrix<f64>, target: &DVector<f64>, weights: &DVector<f64>, k: usize) -> Vec<usize> {
    let p = binary.ncols();
    let Some(LinearFit { coef, .. }) = fit_weighted_ridge(binary, target, weights, RANKING_ALPHA) else {
        return (0..k.min(p)).collect();
    };
    let mut ranked: Vec<(usize, f64)> = (0..p).map(|j| (j, (coef[j] * binary[(0, j)]).abs())).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(k).map(|(j, _)| j).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeatureInput;
    use crate::models::ModelBody;
    use crate::models::model::tests::{sample_forest, stump};

    fn dataset() -> ReferenceDataset {
        let rows = (0..40)
            .map(|i| {
                let v = i as f64;
                [18.0 + v * 0.2, 0.01 * (v + 1.0), 5000.0 + 900.0 * v, 15.0 + v * 0.1]
            })
            .collect();
        ReferenceDataset::from_rows(rows)
    }

    fn config(samples: usize) -> ExplainConfig {
        ExplainConfig {
            num_samples: samples,
            ..ExplainConfig::default()
        }
    }

    #[test]
    fn explains_four_features_for_hazardous_class() {
        let explainer = TabularExplainer::new(&dataset()).unwrap();
        let model = sample_forest();
        let instance = FeatureInput::default().to_vector();

        let exp = explainer
            .explain(&model, &instance, HazardClass::Hazardous, &config(500))
            .unwrap();

        assert_eq!(exp.class, HazardClass::Hazardous);
        assert_eq!(exp.features.len(), 4);
        assert!((exp.predict_proba[1] - 0.775).abs() < 1e-12);
        let mut idx: Vec<usize> = exp.features.iter().map(|f| f.feature_index).collect();
        idx.sort();
        assert_eq!(idx, vec![0, 1, 2, 3]);
        for pair in exp.features.windows(2) {
            assert!(pair[0].weight.abs() >= pair[1].weight.abs());
        }
        assert!(exp.features.iter().all(|f| f.weight.is_finite()));
        assert!(exp.score.is_finite());
    }

    #[test]
    fn same_seed_gives_identical_explanation() {
        let explainer = TabularExplainer::new(&dataset()).unwrap();
        let model = sample_forest();
        let instance = [20.0, 0.2, 20000.0, 17.0];

        let a = explainer.explain(&model, &instance, HazardClass::Hazardous, &config(300)).unwrap();
        let b = explainer.explain(&model, &instance, HazardClass::Hazardous, &config(300)).unwrap();
        let wa: Vec<(usize, f64)> = a.features.iter().map(|f| (f.feature_index, f.weight)).collect();
        let wb: Vec<(usize, f64)> = b.features.iter().map(|f| (f.feature_index, f.weight)).collect();
        assert_eq!(wa, wb);
        assert_eq!(a.intercept, b.intercept);
    }

    #[test]
    fn miss_distance_stump_is_attributed_to_miss_distance() {
        let explainer = TabularExplainer::new(&dataset()).unwrap();
        let model = ModelBody::DecisionTree(stump(17.0, [1.0, 9.0], [9.0, 1.0]));
        // Below every reference miss_distance, so the instance sits in the lowest bin.
        let instance = FeatureInput::default().to_vector();

        let exp = explainer
            .explain(&model, &instance, HazardClass::Hazardous, &config(1000))
            .unwrap();
        assert_eq!(exp.features[0].feature, "miss_distance");
        assert!(exp.features[0].weight > 0.0);
        assert!(exp.features[0].condition.starts_with("miss_distance <= "));
    }

    #[test]
    fn num_features_limits_and_clamps() {
        let explainer = TabularExplainer::new(&dataset()).unwrap();
        let model = sample_forest();
        let instance = FeatureInput::default().to_vector();

        let mut cfg = config(200);
        cfg.num_features = 2;
        let exp = explainer.explain(&model, &instance, HazardClass::Hazardous, &cfg).unwrap();
        assert_eq!(exp.features.len(), 2);

        cfg.num_features = 10;
        cfg.feature_selection = FeatureSelection::HighestWeights;
        let exp = explainer.explain(&model, &instance, HazardClass::Hazardous, &cfg).unwrap();
        assert_eq!(exp.features.len(), 4);

        cfg.num_features = 0;
        assert!(explainer.explain(&model, &instance, HazardClass::Hazardous, &cfg).is_err());
    }

    #[test]
    fn not_hazardous_weights_mirror_hazardous() {
        let explainer = TabularExplainer::new(&dataset()).unwrap();
        let model = ModelBody::DecisionTree(stump(17.0, [1.0, 9.0], [9.0, 1.0]));
        let instance = FeatureInput::default().to_vector();
        let mut cfg = config(400);
        cfg.feature_selection = FeatureSelection::None;

        let h = explainer.explain(&model, &instance, HazardClass::Hazardous, &cfg).unwrap();
        let n = explainer.explain(&model, &instance, HazardClass::NotHazardous, &cfg).unwrap();
        let weight_of = |e: &Explanation, j: usize| {
            e.features.iter().find(|f| f.feature_index == j).map(|f| f.weight).unwrap()
        };
        for j in 0..FEATURE_COUNT {
            assert!((weight_of(&h, j) + weight_of(&n, j)).abs() < 1e-9);
        }
    }
}
