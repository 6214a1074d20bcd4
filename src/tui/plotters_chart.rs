//! Plotters-powered contribution chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.
//! Bars run horizontally from a zero axis: right of it pushes toward the
//! explained class, left of it pushes against.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color as TuiColor, Style},
    widgets::Widget,
};

/// A lightweight, render-only chart description.
///
/// Bars are listed top to bottom; bounds are computed by the caller.
pub struct ContributionChart<'a> {
    /// Signed weight per bar, top bar first.
    pub weights: &'a [f64],
    /// Symmetric x bounds `[-m, m]`.
    pub x_bounds: [f64; 2],
    pub x_label: &'a str,
    pub fmt_x: fn(f64) -> String,
}

impl ContributionChart<'_> {
    /// Symmetric bounds that fit every weight with a small pad.
    pub fn bounds_for(weights: &[f64]) -> [f64; 2] {
        let m = weights
            .iter()
            .map(|w| w.abs())
            .filter(|w| w.is_finite())
            .fold(0.0_f64, f64::max);
        let m = if m > 0.0 { m * 1.1 } else { 1.0 };
        [-m, m]
    }
}

impl Widget for ContributionChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to build a chart in a tiny area; show a hint instead.
        if area.width < 20 || area.height < 6 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(TuiColor::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        if !(x0.is_finite() && x1.is_finite()) || x1 <= x0 || self.weights.is_empty() {
            return;
        }
        let n = self.weights.len() as f64;

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, 0.0..n)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .x_labels(5)
                .y_labels(0)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .draw()?;

            let toward = RGBColor(255, 127, 14); // orange
            let against = RGBColor(31, 119, 180); // blue

            // Bar `i` occupies the band [n - i - 1, n - i] so the first bar is on top.
            chart.draw_series(self.weights.iter().enumerate().map(|(i, &w)| {
                let top = n - i as f64 - 0.2;
                let bottom = n - i as f64 - 0.8;
                let color = if w >= 0.0 { toward } else { against };
                Rectangle::new([(0.0, bottom), (w, top)], color.filled())
            }))?;

            chart.draw_series(LineSeries::new([(0.0, 0.0), (0.0, n)], &WHITE))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_symmetric_and_padded() {
        let b = ContributionChart::bounds_for(&[0.2, -0.5, 0.1]);
        assert!((b[0] + 0.55).abs() < 1e-12);
        assert!((b[1] - 0.55).abs() < 1e-12);
        assert_eq!(ContributionChart::bounds_for(&[]), [-1.0, 1.0]);
    }
}
