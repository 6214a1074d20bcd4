//! Shared prediction workflow used by both CLI and TUI front-ends.
//!
//! FeatureInput -> FeatureVector -> predict_proba -> label -> local explanation
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use serde::Serialize;
use tracing::info;

use crate::data::Session;
use crate::domain::{
    ExplainConfig, Explanation, FEATURE_NAMES, FeatureInput, HazardClass, Prediction,
};
use crate::error::AppError;
use crate::models::Classifier;

/// All computed outputs of a single prediction request.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutput {
    pub input: FeatureInput,
    pub prediction: Prediction,
    pub explanation: Explanation,
}

/// Classify one input. Pure function of the model and the input.
pub fn predict<C: Classifier + ?Sized>(model: &C, input: &FeatureInput) -> Result<Prediction, AppError> {
    let features = input.to_vector();
    if let Some(idx) = features.iter().position(|v| !v.is_finite()) {
        return Err(AppError::input(format!(
            "Feature '{}' is out of range after transformation ({}).",
            FEATURE_NAMES[idx], features[idx]
        )));
    }
    let probabilities = model.predict_proba(&features);
    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(AppError::compute("Model returned non-finite probabilities."));
    }
    let label = model.predict(&features);
    Ok(Prediction {
        features,
        label,
        probability: probabilities[label.index()],
        probabilities,
    })
}

/// Predict and explain one input against a loaded session.
pub fn run_prediction(
    session: &Session,
    input: &FeatureInput,
    config: &ExplainConfig,
) -> Result<PredictionOutput, AppError> {
    let prediction = predict(&session.model.model, input)?;
    info!(
        label = prediction.label.display_name(),
        probability = prediction.probability,
        "prediction"
    );

    let class: HazardClass = config.target.resolve(prediction.label);
    let explanation = session
        .explainer
        .explain(&session.model.model, &prediction.features, class, config)?;
    info!(
        class = class.display_name(),
        score = explanation.score,
        features = explanation.features.len(),
        "explanation"
    );

    Ok(PredictionOutput {
        input: *input,
        prediction,
        explanation,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::AssetConfig;
    use crate::io::ingest::read_reference_dataset;
    use crate::io::model_file::ModelArtifact;
    use crate::models::model::tests::sample_forest;
    use crate::models::{LogisticModel, ModelBody};

    pub(crate) fn test_session() -> Session {
        let mut csv = String::from("absolute_magnitude,estimated_diameter_max,relative_velocity,miss_distance,is_hazardous\n");
        for i in 0..40 {
            let v = i as f64;
            csv.push_str(&format!("{},{},{},{},{}\n", 18.0 + v * 0.2, 0.01 * (v + 1.0), 5000.0 + 900.0 * v, 15.0 + v * 0.1, i % 3 == 0));
        }
        let ingest = read_reference_dataset(csv.as_bytes()).unwrap();
        Session::from_parts(AssetConfig::default(), ModelArtifact::new(sample_forest()), ingest).unwrap()
    }

    #[test]
    fn default_input_is_deterministic() {
        let session = test_session();
        let config = ExplainConfig {
            num_samples: 300,
            ..ExplainConfig::default()
        };
        let input = FeatureInput::default();

        let a = run_prediction(&session, &input, &config).unwrap();
        let b = run_prediction(&session, &input, &config).unwrap();
        assert_eq!(a.prediction.label, HazardClass::Hazardous);
        assert!((a.prediction.probability - 0.775).abs() < 1e-12);
        assert_eq!(a.prediction.probabilities, b.prediction.probabilities);
        assert_eq!(a.explanation.features.len(), 4);
        assert_eq!(a.explanation.class, HazardClass::Hazardous);
        let wa: Vec<f64> = a.explanation.features.iter().map(|f| f.weight).collect();
        let wb: Vec<f64> = b.explanation.features.iter().map(|f| f.weight).collect();
        assert_eq!(wa, wb);
    }

    #[test]
    fn logistic_probability_uses_log_miss_distance() {
        // Only miss_distance matters: p1 = sigmoid(ln(1 + 500000) - 13).
        let model = ModelBody::LogisticRegression(LogisticModel {
            coef: vec![0.0, 0.0, 0.0, 1.0],
            intercept: -13.0,
        });
        let p = predict(&model, &FeatureInput::default()).unwrap();
        let z = 500_000.0_f64.ln_1p() - 13.0;
        let expected = 1.0 / (1.0 + (-z).exp());
        assert!((p.probabilities[1] - expected).abs() < 1e-12);
        assert_eq!(p.label, HazardClass::Hazardous);
    }

    #[test]
    fn miss_distance_below_log_domain_is_rejected() {
        let session = test_session();
        for miss_distance in [-5.0, -1.0] {
            let input = FeatureInput {
                miss_distance,
                ..FeatureInput::default()
            };
            let err = run_prediction(&session, &input, &ExplainConfig::default()).unwrap_err();
            assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
            assert!(err.to_string().contains("miss_distance"));
        }
    }

    #[test]
    fn predicted_target_follows_label() {
        let session = test_session();
        let config = ExplainConfig {
            num_samples: 200,
            target: crate::domain::ExplainTarget::Predicted,
            ..ExplainConfig::default()
        };
        let input = FeatureInput {
            absolute_magnitude: 25.0,
            miss_distance: 60_000_000.0,
            ..FeatureInput::default()
        };
        let out = run_prediction(&session, &input, &config).unwrap();
        // ln(1 + 6e7) ≈ 17.9 > 17 and 25 > 22.5: both stumps vote not hazardous.
        assert_eq!(out.prediction.label, HazardClass::NotHazardous);
        assert_eq!(out.explanation.class, HazardClass::NotHazardous);
        assert!((out.prediction.probability - 0.8875).abs() < 1e-12);
    }
}
