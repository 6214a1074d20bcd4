//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-width rows), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! One row per explained feature, diverging from a center axis `|`:
//! bars to the right (`#`) push toward the explained class, bars to the left
//! (`=`) push against it. The largest `|weight|` fills its half.

use crate::domain::Explanation;

const LABEL_WIDTH: usize = 32;

/// Render the contribution chart of an explanation.
pub fn render_contribution_bars(explanation: &Explanation, width: usize) -> String {
    let width = width.max(20);
    let half = (width - 1) / 2;

    let max_abs = explanation
        .features
        .iter()
        .map(|f| f.weight.abs())
        .filter(|w| w.is_finite())
        .fold(0.0_f64, f64::max);
    let scale = if max_abs > 0.0 { half as f64 / max_abs } else { 0.0 };

    let mut out = String::new();
    out.push_str(&format!(
        "Contributions: against `{}` <- | -> toward `{}`\n",
        explanation.class.display_name(),
        explanation.class.display_name()
    ));

    for f in &explanation.features {
        let n = if f.weight.is_finite() {
            ((f.weight.abs() * scale).round() as usize).min(half)
        } else {
            0
        };
        let (left, right) = if f.weight < 0.0 {
            (format!("{}{}", " ".repeat(half - n), "=".repeat(n)), String::new())
        } else {
            (" ".repeat(half), "#".repeat(n))
        };

        let label = fit_label(&f.condition);
        let line = format!("{label:<LABEL_WIDTH$} {left}|{right} {:+.3}", f.weight);
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn fit_label(s: &str) -> String {
    if s.chars().count() <= LABEL_WIDTH {
        return s.to_string();
    }
    let mut out: String = s.chars().take(LABEL_WIDTH - 1).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureWeight, HazardClass};

    fn weight(condition: &str, w: f64) -> FeatureWeight {
        FeatureWeight {
            feature_index: 0,
            feature: "x".to_string(),
            condition: condition.to_string(),
            value: 0.0,
            weight: w,
        }
    }

    #[test]
    fn bars_golden_snapshot_small() {
        let exp = Explanation {
            class: HazardClass::Hazardous,
            intercept: 0.0,
            local_prediction: 0.0,
            score: 1.0,
            predict_proba: [0.5, 0.5],
            num_samples: 10,
            features: vec![weight("a", 0.4), weight("b", -0.2), weight("c", 0.0)],
        };
        let text = render_contribution_bars(&exp, 21);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);

        let pad = " ".repeat(LABEL_WIDTH - 1);
        assert_eq!(lines[1], format!("a{pad} {}|{} +0.400", " ".repeat(10), "#".repeat(10)));
        assert_eq!(lines[2], format!("b{pad} {}{}| -0.200", " ".repeat(5), "=".repeat(5)));
        assert_eq!(lines[3], format!("c{pad} {}| +0.000", " ".repeat(10)));
    }

    #[test]
    fn long_conditions_are_cut() {
        let label = fit_label(&"m".repeat(50));
        assert_eq!(label.chars().count(), LABEL_WIDTH);
        assert!(label.ends_with('.'));
    }
}
