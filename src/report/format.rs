//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the model/explainer code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::app::pipeline::PredictionOutput;
use crate::data::Session;
use crate::domain::{Explanation, FEATURE_NAMES, HazardClass, INPUT_FIELDS, MISS_DISTANCE_INDEX};
use crate::io::model_file::{ModelManifest, TrustList};

/// Width of the condition column in explanation tables.
const CONDITION_WIDTH: usize = 40;

/// Header block: what was loaded.
pub fn format_session_summary(session: &Session) -> String {
    let mut out = String::new();
    out.push_str("=== neo - NEO Hazard Prediction ===\n");
    out.push_str(&format!(
        "Model: {} ({})\n",
        session.model.model.display_name(),
        session.config.model_path.display()
    ));

    let ingest = &session.ingest;
    let mut data_line = format!(
        "Reference data: n={} ({})",
        ingest.rows_used,
        session.config.data_path.display()
    );
    if let Some(n_haz) = ingest.stats.n_hazardous {
        data_line.push_str(&format!(" | hazardous={n_haz}"));
    }
    if !ingest.row_errors.is_empty() {
        data_line.push_str(&format!(" | skipped rows={}", ingest.row_errors.len()));
    }
    out.push_str(&data_line);
    out.push('\n');
    for (idx, name) in FEATURE_NAMES.iter().enumerate() {
        out.push_str(&format!(
            "  {name:<24} [{:.4}, {:.4}]\n",
            ingest.stats.min[idx], ingest.stats.max[idx]
        ));
    }
    out
}

/// Input values, verdict and class probabilities.
pub fn format_prediction(output: &PredictionOutput) -> String {
    let mut out = String::new();

    out.push_str("\nInput:\n");
    for (idx, field) in INPUT_FIELDS.iter().enumerate() {
        let raw = output.input.get(idx).unwrap_or(f64::NAN);
        if idx == MISS_DISTANCE_INDEX {
            out.push_str(&format!(
                "  {:<24} {raw:>16.3}  (log1p {:.4})\n",
                field.name, output.prediction.features[idx]
            ));
        } else {
            out.push_str(&format!("  {:<24} {raw:>16.3}\n", field.name));
        }
    }

    out.push('\n');
    out.push_str(&output.prediction.verdict());
    out.push('\n');
    out.push_str(&format!(
        "Probabilities: {} {:.2}% | {} {:.2}%\n",
        HazardClass::NotHazardous.display_name(),
        output.prediction.probabilities[0] * 100.0,
        HazardClass::Hazardous.display_name(),
        output.prediction.probabilities[1] * 100.0,
    ));
    out
}

/// Explanation header plus a condition/weight table.
pub fn format_explanation(explanation: &Explanation) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\nLocal explanation for class `{}` (samples={}):\n",
        explanation.class.display_name(),
        explanation.num_samples
    ));
    out.push_str(&format!(
        "- intercept={:.4} local_prediction={:.4} score(R²)={:.4}\n",
        explanation.intercept, explanation.local_prediction, explanation.score
    ));
    out.push('\n');

    out.push_str(format!("{:<CONDITION_WIDTH$} {:>10} {:<8}", "condition", "weight", "effect").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<CONDITION_WIDTH$} {:-<10} {:-<8}", "", "", "").trim_end());
    out.push('\n');

    for f in &explanation.features {
        let effect = if f.weight > 0.0 {
            "toward"
        } else if f.weight < 0.0 {
            "against"
        } else {
            ""
        };
        out.push_str(
            format!(
                "{:<CONDITION_WIDTH$} {:>+10.4} {:<8}",
                truncate(&f.condition, CONDITION_WIDTH),
                f.weight,
                effect
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// `neo inspect` output: manifest, trust status of each entry.
pub fn format_inspect(path: &Path, manifest: &ModelManifest, trust: &TrustList) -> String {
    let untrusted = manifest.untrusted_types(trust);

    let mut out = String::new();
    out.push_str(&format!("Model file: {}\n", path.display()));
    out.push_str(&format!("Format: {} v{}\n", manifest.format, manifest.version));
    out.push_str(&format!("Expected features: {}\n", FEATURE_NAMES.join(", ")));
    out.push_str("\nManifest:\n");
    for ty in &manifest.manifest {
        let mark = if trust.contains(ty) { "trusted" } else { "UNTRUSTED" };
        out.push_str(&format!("  [{mark:>9}] {ty}\n"));
    }

    out.push('\n');
    if untrusted.is_empty() {
        out.push_str("All types are trusted; the model can be loaded.\n");
    } else {
        out.push_str(&format!("Untrusted types: {}\n", untrusted.join(", ")));
        out.push_str("The model will be refused unless each is passed with `--trust <TYPE>`.\n");
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
