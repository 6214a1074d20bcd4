//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the loader, classifier, and explainer
//! - exported to JSON/HTML
//! - rendered by the CLI and the TUI without extra conversions

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Number of model features.
pub const FEATURE_COUNT: usize = 4;

/// Feature names in model order.
///
/// The reference dataset and the model artifact must both use exactly these
/// columns (in this order once reordered by name).
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "absolute_magnitude",
    "estimated_diameter_max",
    "relative_velocity",
    "miss_distance",
];

/// Index of the log-scaled miss distance in a `FeatureVector`.
pub const MISS_DISTANCE_INDEX: usize = 3;

/// A single model-space row: raw features with `ln(1 + miss_distance)` in the last slot.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Form metadata for one input field (label, default, and step size).
#[derive(Debug, Clone, Copy)]
pub struct InputField {
    pub name: &'static str,
    pub label: &'static str,
    pub default: f64,
    pub step: f64,
}

/// Input form fields, in model order.
pub const INPUT_FIELDS: [InputField; FEATURE_COUNT] = [
    InputField {
        name: "absolute_magnitude",
        label: "Absolute Magnitude (Describes intrinsic luminosity.)",
        default: 22.0,
        step: 0.1,
    },
    InputField {
        name: "estimated_diameter_max",
        label: "Maximum estimated diameter in kilometers",
        default: 0.1,
        step: 0.01,
    },
    InputField {
        name: "relative_velocity",
        label: "Velocity relative to Earth in km/h.",
        default: 20.0,
        step: 0.1,
    },
    InputField {
        name: "miss_distance",
        label: "Distance in kilometers missed",
        default: 500_000.0,
        step: 1000.0,
    },
];

/// User-supplied NEO features, as typed into the form.
///
/// `miss_distance` is in raw kilometers here; the log transform happens only in
/// [`FeatureInput::to_vector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureInput {
    pub absolute_magnitude: f64,
    pub estimated_diameter_max: f64,
    pub relative_velocity: f64,
    pub miss_distance: f64,
}

impl Default for FeatureInput {
    fn default() -> Self {
        Self {
            absolute_magnitude: INPUT_FIELDS[0].default,
            estimated_diameter_max: INPUT_FIELDS[1].default,
            relative_velocity: INPUT_FIELDS[2].default,
            miss_distance: INPUT_FIELDS[3].default,
        }
    }
}

impl FeatureInput {
    /// Assemble the model-space row.
    pub fn to_vector(&self) -> FeatureVector {
        [
            self.absolute_magnitude,
            self.estimated_diameter_max,
            self.relative_velocity,
            self.miss_distance.ln_1p(),
        ]
    }

    /// Read a field by model index.
    pub fn get(&self, index: usize) -> Option<f64> {
        match index {
            0 => Some(self.absolute_magnitude),
            1 => Some(self.estimated_diameter_max),
            2 => Some(self.relative_velocity),
            3 => Some(self.miss_distance),
            _ => None,
        }
    }

    /// Overwrite a field by model index. Out-of-range indexes are ignored.
    pub fn set(&mut self, index: usize, value: f64) {
        match index {
            0 => self.absolute_magnitude = value,
            1 => self.estimated_diameter_max = value,
            2 => self.relative_velocity = value,
            3 => self.miss_distance = value,
            _ => {}
        }
    }

    /// Step a field by `delta` multiples of its widget step size.
    pub fn step(&mut self, index: usize, delta: i32) {
        let (Some(current), Some(field)) = (self.get(index), INPUT_FIELDS.get(index)) else {
            return;
        };
        let next = current + field.step * f64::from(delta);
        // Round to the step's precision so repeated stepping doesn't drift (0.30000000000000004).
        let scale = 1.0 / field.step.min(1.0);
        self.set(index, (next * scale).round() / scale);
    }
}

/// Binary hazard label. The discriminant is the class index used by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardClass {
    NotHazardous = 0,
    Hazardous = 1,
}

impl HazardClass {
    pub const ALL: [HazardClass; 2] = [HazardClass::NotHazardous, HazardClass::Hazardous];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Class name as shown in reports.
    pub fn display_name(self) -> &'static str {
        match self {
            HazardClass::NotHazardous => "No Hazardous",
            HazardClass::Hazardous => "Hazardous",
        }
    }
}

/// Classifier output for one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Model-space row that was scored.
    pub features: FeatureVector,
    pub label: HazardClass,
    /// Probability of `label`.
    pub probability: f64,
    /// Probabilities indexed by class.
    pub probabilities: [f64; 2],
}

impl Prediction {
    /// One-line verdict, worded for end users.
    pub fn verdict(&self) -> String {
        let pct = self.probability * 100.0;
        match self.label {
            HazardClass::Hazardous => format!(
                "Hazardous! This NEO is likely dangerous with a probability of {pct:.2}%."
            ),
            HazardClass::NotHazardous => format!(
                "Not Hazardous. This NEO is not dangerous with a probability of {pct:.2}%."
            ),
        }
    }
}

/// Which class the local explanation attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExplainTarget {
    /// Always explain the positive class.
    Hazardous,
    /// Always explain the negative class.
    NotHazardous,
    /// Explain whichever class was predicted.
    Predicted,
}

impl ExplainTarget {
    pub fn resolve(self, predicted: HazardClass) -> HazardClass {
        match self {
            ExplainTarget::Hazardous => HazardClass::Hazardous,
            ExplainTarget::NotHazardous => HazardClass::NotHazardous,
            ExplainTarget::Predicted => predicted,
        }
    }
}

/// How the explainer picks which features enter the surrogate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureSelection {
    /// Forward selection for up to 6 features, highest weights beyond that.
    Auto,
    /// Greedy forward selection on weighted R².
    Forward,
    /// Largest absolute coefficients of a ridge fit on all features.
    HighestWeights,
    /// Use every feature.
    None,
}

/// Local explainer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    pub num_features: usize,
    pub num_samples: usize,
    pub seed: u64,
    /// Kernel width; `None` means `0.75 * sqrt(n_features)`.
    pub kernel_width: Option<f64>,
    pub target: ExplainTarget,
    pub feature_selection: FeatureSelection,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            num_features: 4,
            num_samples: 5000,
            seed: 42,
            kernel_width: None,
            target: ExplainTarget::Hazardous,
            feature_selection: FeatureSelection::Auto,
        }
    }
}

/// One attributed feature in a local explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature_index: usize,
    pub feature: String,
    /// Bin condition the instance falls into (e.g. `"miss_distance > 17.80"`).
    pub condition: String,
    /// Instance value in model space.
    pub value: f64,
    /// Signed surrogate coefficient; positive pushes toward the explained class.
    pub weight: f64,
}

/// Local surrogate explanation for a single prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub class: HazardClass,
    pub intercept: f64,
    /// Surrogate prediction at the instance.
    pub local_prediction: f64,
    /// Weighted R² of the surrogate on the neighborhood.
    pub score: f64,
    /// Classifier probabilities at the instance.
    pub predict_proba: [f64; 2],
    pub num_samples: usize,
    /// Sorted by `|weight|`, largest first.
    pub features: Vec<FeatureWeight>,
}
