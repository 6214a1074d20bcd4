//! Export a prediction and its explanation to HTML or JSON.
//!
//! The HTML report is a single self-contained document: inline CSS, no
//! scripts, no external assets. It can be opened straight from disk.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::app::pipeline::PredictionOutput;
use crate::domain::{Explanation, FeatureInput, HazardClass, INPUT_FIELDS, Prediction};
use crate::error::AppError;

const STYLE: &str = "\
body{font-family:-apple-system,Segoe UI,Helvetica,Arial,sans-serif;margin:2em;color:#222}\
h1{font-size:1.4em}h2{font-size:1.1em;margin-top:1.6em}\
.verdict{font-size:1.1em;font-weight:600;padding:.6em .8em;border-radius:4px}\
.hazardous{background:#fde2e1;color:#8a1c16}.safe{background:#e3f4e1;color:#1d5e17}\
table{border-collapse:collapse;margin-top:.6em}td,th{padding:.25em .7em;text-align:left;border-bottom:1px solid #ddd}\
td.num{text-align:right;font-variant-numeric:tabular-nums}\
.bar{display:inline-block;height:.9em;vertical-align:middle}\
.track{display:inline-block;width:160px;vertical-align:middle}\
.track.left{text-align:right}\
.pos{background:#ff7f0e}.neg{background:#1f77b4}.p0{background:#1f77b4}.p1{background:#ff7f0e}\
.meta{color:#666;font-size:.85em}";

/// JSON export document.
#[derive(Debug, Serialize)]
pub struct PredictionExport<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub input: &'a FeatureInput,
    pub prediction: &'a Prediction,
    pub verdict: String,
    pub explanation: &'a Explanation,
}

/// Write prediction + explanation as pretty JSON.
pub fn write_prediction_json(path: &Path, output: &PredictionOutput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create JSON export '{}': {e}", path.display())))?;
    let doc = PredictionExport {
        tool: "neo",
        generated_at: Utc::now(),
        input: &output.input,
        prediction: &output.prediction,
        verdict: output.prediction.verdict(),
        explanation: &output.explanation,
    };
    serde_json::to_writer_pretty(file, &doc)
        .map_err(|e| AppError::input(format!("Failed to write JSON export: {e}")))?;
    info!(path = %path.display(), "wrote JSON export");
    Ok(())
}

/// Write the HTML explanation report.
pub fn write_html_report(path: &Path, output: &PredictionOutput) -> Result<(), AppError> {
    let html = render_html_report(output, Utc::now());
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create HTML report '{}': {e}", path.display())))?;
    file.write_all(html.as_bytes())
        .map_err(|e| AppError::input(format!("Failed to write HTML report: {e}")))?;
    info!(path = %path.display(), "wrote HTML report");
    Ok(())
}

/// Render the HTML report.
pub fn render_html_report(output: &PredictionOutput, generated_at: DateTime<Utc>) -> String {
    let prediction = &output.prediction;
    let explanation = &output.explanation;
    let class = explanation.class.display_name();

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>NEO hazard explanation</title>\n");
    html.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));
    html.push_str("<h1>Near-Earth Object Hazard Prediction</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Generated {}</p>\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let verdict_class = match prediction.label {
        HazardClass::Hazardous => "hazardous",
        HazardClass::NotHazardous => "safe",
    };
    html.push_str(&format!(
        "<p class=\"verdict {verdict_class}\">{}</p>\n",
        escape(&prediction.verdict())
    ));

    html.push_str("<h2>Prediction probabilities</h2>\n<table>\n");
    for c in HazardClass::ALL {
        let p = prediction.probabilities[c.index()];
        html.push_str(&format!(
            "<tr><td>{}</td><td><span class=\"bar p{}\" style=\"width:{}px\"></span></td><td class=\"num\">{:.2}</td></tr>\n",
            escape(c.display_name()),
            c.index(),
            bar_px(p, 1.0),
            p
        ));
    }
    html.push_str("</table>\n");

    html.push_str(&format!(
        "<h2>Feature contributions</h2>\n<p class=\"meta\">Left: against {0}. Right: toward {0}. \
         Intercept {1:.4}, local prediction {2:.4}, score {3:.4}, {4} samples.</p>\n<table>\n",
        escape(class),
        explanation.intercept,
        explanation.local_prediction,
        explanation.score,
        explanation.num_samples
    ));
    let max_abs = explanation
        .features
        .iter()
        .map(|f| f.weight.abs())
        .filter(|w| w.is_finite())
        .fold(0.0_f64, f64::max);
    for f in &explanation.features {
        let px = bar_px(f.weight.abs(), max_abs);
        let (left, right) = if f.weight < 0.0 {
            (format!("<span class=\"bar neg\" style=\"width:{px}px\"></span>"), String::new())
        } else {
            (String::new(), format!("<span class=\"bar pos\" style=\"width:{px}px\"></span>"))
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td><span class=\"track left\">{left}</span><span class=\"track\">{right}</span></td><td class=\"num\">{:+.4}</td></tr>\n",
            escape(&f.condition),
            f.weight
        ));
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Feature values</h2>\n<table>\n<tr><th>Feature</th><th>Input</th><th>Model value</th></tr>\n");
    for (idx, field) in INPUT_FIELDS.iter().enumerate() {
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{:.4}</td></tr>\n",
            escape(field.label),
            output.input.get(idx).map(|v| format!("{v:.3}")).unwrap_or_default(),
            prediction.features[idx]
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

/// Bar width in pixels (0..=160) for `value` relative to `max`.
fn bar_px(value: f64, max: f64) -> u32 {
    if !(value.is_finite() && max.is_finite() && max > 0.0) {
        return 0;
    }
    ((value / max).clamp(0.0, 1.0) * 160.0).round() as u32
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
