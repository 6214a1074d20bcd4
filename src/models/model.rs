//! Classifier evaluation for tree ensembles and logistic regression.
//!
//! The explainer and the prediction handler only need two primitive operations:
//! - class probabilities for one model-space row (`predict_proba`)
//! - the argmax label (`predict`)
//!
//! Each supported model kind implements them here. Tree arrays follow the usual
//! flat layout: node `i` has `children_left[i]`/`children_right[i]` (`-1` for a
//! leaf), a split `feature[i]`/`threshold[i]`, and per-class leaf weights
//! `value[i]`. Rows with `x[feature] <= threshold` go left.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{FEATURE_COUNT, FeatureVector, HazardClass};

/// Marker for "no child" in tree arrays.
pub const LEAF: i64 = -1;

/// A fitted binary classifier over `FeatureVector` rows.
pub trait Classifier: Send + Sync {
    /// Probabilities indexed by class; sums to 1.
    fn predict_proba(&self, row: &FeatureVector) -> [f64; 2];

    /// Most probable class. Ties go to the lower class index.
    fn predict(&self, row: &FeatureVector) -> HazardClass {
        let p = self.predict_proba(row);
        if p[1] > p[0] {
            HazardClass::Hazardous
        } else {
            HazardClass::NotHazardous
        }
    }
}

/// Score many rows in parallel. Output order matches `rows`.
pub fn predict_proba_batch<C: Classifier + ?Sized>(model: &C, rows: &[FeatureVector]) -> Vec<[f64; 2]> {
    rows.par_iter().map(|row| model.predict_proba(row)).collect()
}

/// A single fitted decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeModel {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<[f64; 2]>,
}

impl TreeModel {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    /// Check array shapes and that every path from the root terminates.
    ///
    /// Children must have a larger index than their parent, which rules out cycles.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(format!(
                "tree arrays disagree on node count (left={}, right={}, feature={}, threshold={}, value={})",
                n,
                self.children_right.len(),
                self.feature.len(),
                self.threshold.len(),
                self.value.len()
            ));
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            match (left == LEAF, right == LEAF) {
                (true, true) => {
                    let v = self.value[i];
                    if !v.iter().all(|x| x.is_finite() && *x >= 0.0) || v[0] + v[1] <= 0.0 {
                        return Err(format!("leaf {i} has invalid class weights {v:?}"));
                    }
                }
                (false, false) => {
                    for child in [left, right] {
                        if child <= i as i64 || child >= n as i64 {
                            return Err(format!("node {i} has out-of-order child {child}"));
                        }
                    }
                    let f = self.feature[i];
                    if f < 0 || f >= FEATURE_COUNT as i64 {
                        return Err(format!("node {i} splits on unknown feature {f}"));
                    }
                    if !self.threshold[i].is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                }
                _ => return Err(format!("node {i} has exactly one child")),
            }
        }
        Ok(())
    }

    /// Normalized class distribution of the leaf reached by `row`.
    pub fn leaf_proba(&self, row: &FeatureVector) -> [f64; 2] {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let f = self.feature[node] as usize;
            node = if row[f] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let v = self.value[node];
        let total = v[0] + v[1];
        [v[0] / total, v[1] / total]
    }
}

/// Soft-voting ensemble of decision trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<TreeModel>,
}

/// Binary logistic regression: `p1 = sigmoid(coef · x + intercept)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

/// Model body of an artifact, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBody {
    RandomForest(ForestModel),
    DecisionTree(TreeModel),
    LogisticRegression(LogisticModel),
}

impl ModelBody {
    pub fn display_name(&self) -> String {
        match self {
            ModelBody::RandomForest(f) => format!("Random forest ({} trees)", f.trees.len()),
            ModelBody::DecisionTree(t) => format!("Decision tree ({} nodes)", t.node_count()),
            ModelBody::LogisticRegression(_) => "Logistic regression".to_string(),
        }
    }

    /// Structural checks run right after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ModelBody::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                for (idx, tree) in forest.trees.iter().enumerate() {
                    tree.validate().map_err(|e| format!("tree {idx}: {e}"))?;
                }
                Ok(())
            }
            ModelBody::DecisionTree(tree) => tree.validate(),
            ModelBody::LogisticRegression(lr) => {
                if lr.coef.len() != FEATURE_COUNT {
                    return Err(format!(
                        "logistic regression has {} coefficients, expected {FEATURE_COUNT}",
                        lr.coef.len()
                    ));
                }
                if !lr.coef.iter().chain(std::iter::once(&lr.intercept)).all(|v| v.is_finite()) {
                    return Err("logistic regression has non-finite parameters".to_string());
                }
                Ok(())
            }
        }
    }
}

impl Classifier for ModelBody {
    fn predict_proba(&self, row: &FeatureVector) -> [f64; 2] {
        match self {
            ModelBody::RandomForest(forest) => {
                let mut acc = [0.0, 0.0];
                for tree in &forest.trees {
                    let p = tree.leaf_proba(row);
                    acc[0] += p[0];
                    acc[1] += p[1];
                }
                let n = forest.trees.len() as f64;
                [acc[0] / n, acc[1] / n]
            }
            ModelBody::DecisionTree(tree) => tree.leaf_proba(row),
            ModelBody::LogisticRegression(lr) => {
                let z = lr.intercept
                    + lr.coef.iter().zip(row.iter()).map(|(w, x)| w * x).sum::<f64>();
                let p1 = sigmoid(z);
                [1.0 - p1, p1]
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
