//! Ratatui-based terminal UI.
//!
//! The TUI is the interactive form: a sidebar with the four NEO features, a
//! predict action, and a result panel with the verdict and the feature
//! contributions. The session (model + reference data) is loaded before the
//! terminal is taken over and is reused for every prediction.
//!
//! In placeholder mode (`neo preview`) the same form is shown without a
//! session and the predict action leaves "Awaiting Prediction" in place.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use tracing::error;

use crate::app::pipeline::{PredictionOutput, run_prediction};
use crate::data::Session;
use crate::domain::{ExplainConfig, FeatureInput, HazardClass, INPUT_FIELDS};
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::ContributionChart;

const AWAITING: &str = "Awaiting Prediction";

/// Start the TUI with a prepared app state.
pub fn run(mut app: App) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::compute(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::compute(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::compute(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Interactive form state.
pub struct App {
    /// `None` in placeholder mode.
    session: Option<Session>,
    input: FeatureInput,
    explain: ExplainConfig,
    html_path: PathBuf,
    selected_field: usize,
    /// Typed value while editing the selected field.
    edit_buffer: Option<String>,
    status: String,
    output: Option<PredictionOutput>,
}

impl App {
    /// Form backed by a loaded session.
    pub fn new(session: Session, input: FeatureInput, explain: ExplainConfig, html_path: PathBuf) -> Self {
        Self {
            session: Some(session),
            input,
            explain,
            html_path,
            selected_field: 0,
            edit_buffer: None,
            status: "Adjust the features and press p to predict.".to_string(),
            output: None,
        }
    }

    /// Form with no model behind it.
    pub fn placeholder(input: FeatureInput) -> Self {
        Self {
            session: None,
            input,
            explain: ExplainConfig::default(),
            html_path: PathBuf::new(),
            selected_field: 0,
            edit_buffer: None,
            status: "Preview form: predict is not wired to a model.".to_string(),
            output: None,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::compute(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::compute(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::compute(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply one key press. Returns `true` to quit.
    ///
    /// Request failures are shown in the status line; the TUI keeps running.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.edit_buffer.is_some() {
            self.handle_edit(code);
            return false;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.selected_field = self.selected_field.saturating_sub(1),
            KeyCode::Down => {
                if self.selected_field + 1 < INPUT_FIELDS.len() {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.step_field(-1),
            KeyCode::Right => self.step_field(1),
            KeyCode::Enter => {
                self.edit_buffer = Some(String::new());
                self.status = format!(
                    "Editing {}. Enter to apply, Esc to cancel.",
                    INPUT_FIELDS[self.selected_field].name
                );
            }
            KeyCode::Char('p') => self.predict(),
            KeyCode::Char('h') => self.write_html(),
            _ => {}
        }
        false
    }

    fn handle_edit(&mut self, code: KeyCode) {
        let Some(buffer) = self.edit_buffer.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.edit_buffer = None;
                self.status = "Edit canceled.".to_string();
            }
            KeyCode::Enter => {
                let text = buffer.trim().to_string();
                self.edit_buffer = None;
                match text.parse::<f64>() {
                    Ok(v) if v.is_finite() => {
                        self.input.set(self.selected_field, v);
                        self.output = None;
                        self.status = format!("{} = {v}", INPUT_FIELDS[self.selected_field].name);
                    }
                    _ => self.status = format!("Invalid number '{text}'."),
                }
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E') => {
                buffer.push(c);
            }
            _ => {}
        }
    }

    fn step_field(&mut self, delta: i32) {
        self.input.step(self.selected_field, delta);
        // A result only describes the inputs it was computed from.
        self.output = None;
        if let Some(v) = self.input.get(self.selected_field) {
            self.status = format!("{} = {v}", INPUT_FIELDS[self.selected_field].name);
        }
    }

    fn predict(&mut self) {
        let Some(session) = &self.session else {
            // Placeholder: the button exists, nothing happens.
            return;
        };
        match run_prediction(session, &self.input, &self.explain) {
            Ok(output) => {
                self.status = "Prediction updated. Press h to write the HTML report.".to_string();
                self.output = Some(output);
            }
            Err(err) => {
                error!(%err, "prediction failed");
                self.status = format!("Prediction failed: {err}");
            }
        }
    }

    fn write_html(&mut self) {
        if self.session.is_none() {
            return;
        }
        let Some(output) = &self.output else {
            self.status = "Nothing to export yet: press p first.".to_string();
            return;
        };
        self.status = match crate::io::export::write_html_report(&self.html_path, output) {
            Ok(()) => format!("Wrote HTML report: {}", self.html_path.display()),
            Err(err) => format!("HTML export failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let detail = match &self.session {
            Some(session) => format!(
                "model: {} | reference rows: {}",
                session.model.model.display_name(),
                session.ingest.rows_used
            ),
            None => "preview (no model loaded)".to_string(),
        };
        let line = Line::from(vec![
            Span::styled("neo", Style::default().fg(Color::Cyan)),
            Span::raw(" | Near-Earth Object Hazard Prediction | "),
            Span::styled(detail, Style::default().fg(Color::Gray)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(44), Constraint::Min(0)])
            .split(area);

        self.draw_form(frame, chunks[0]);
        self.draw_result(frame, chunks[1]);
    }

    fn draw_form(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut items = Vec::new();
        for (idx, field) in INPUT_FIELDS.iter().enumerate() {
            let value = match (&self.edit_buffer, idx == self.selected_field) {
                (Some(buffer), true) => format!("{buffer}_"),
                _ => fmt_value(self.input.get(idx).unwrap_or(f64::NAN), field.step),
            };
            items.push(ListItem::new(Text::from(vec![
                Line::from(Span::styled(field.label, Style::default().fg(Color::Gray))),
                Line::from(format!("  {value}  (step {})", field.step)),
            ])));
        }

        let list = List::new(items)
            .block(Block::default().title("Input Features").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);

        let button = Paragraph::new("[ Predict (p) ]")
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        let rect = Rect {
            x: area.x + 2,
            y: area.y + area.height.saturating_sub(2),
            width: area.width.saturating_sub(4),
            height: 1,
        };
        frame.render_widget(button, rect);
    }

    fn draw_result(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Prediction").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(output) = &self.output else {
            let msg = Paragraph::new(AWAITING).style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let rows = output.explanation.features.len() as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(6),
                Constraint::Length(rows + 2),
            ])
            .split(inner);

        let verdict_color = match output.prediction.label {
            HazardClass::Hazardous => Color::Red,
            HazardClass::NotHazardous => Color::Green,
        };
        let summary = Paragraph::new(Text::from(vec![
            Line::from(Span::styled(
                output.prediction.verdict(),
                Style::default().fg(verdict_color).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "{} {:.2}  |  {} {:.2}",
                HazardClass::NotHazardous.display_name(),
                output.prediction.probabilities[0],
                HazardClass::Hazardous.display_name(),
                output.prediction.probabilities[1],
            )),
            Line::from(Span::styled(
                format!(
                    "explaining `{}`: intercept {:.3}, local {:.3}, score {:.3}",
                    output.explanation.class.display_name(),
                    output.explanation.intercept,
                    output.explanation.local_prediction,
                    output.explanation.score
                ),
                Style::default().fg(Color::Gray),
            )),
        ]))
        .wrap(Wrap { trim: true });
        frame.render_widget(summary, chunks[0]);

        let weights: Vec<f64> = output.explanation.features.iter().map(|f| f.weight).collect();
        let chart = ContributionChart {
            weights: &weights,
            x_bounds: ContributionChart::bounds_for(&weights),
            x_label: "contribution",
            fmt_x: fmt_weight,
        };
        frame.render_widget(chart, chunks[1]);

        let legend: Vec<Line> = output
            .explanation
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let color = if f.weight >= 0.0 { Color::Rgb(255, 127, 14) } else { Color::Rgb(31, 119, 180) };
                Line::from(vec![
                    Span::styled(format!("{}. {:+.4} ", i + 1, f.weight), Style::default().fg(color)),
                    Span::raw(f.condition.clone()),
                ])
            })
            .collect();
        let legend = Paragraph::new(Text::from(legend)).block(Block::default().borders(Borders::TOP));
        frame.render_widget(legend, chunks[2]);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = if self.session.is_some() {
            "↑/↓ select  ←/→ step  Enter edit  p predict  h html  q quit"
        } else {
            "↑/↓ select  ←/→ step  Enter edit  p predict  q quit"
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Format a field value with as many decimals as its step.
fn fmt_value(v: f64, step: f64) -> String {
    let decimals = if step >= 1.0 {
        0
    } else {
        (-step.log10()).round().max(0.0) as usize
    };
    format!("{v:.decimals$}")
}

fn fmt_weight(v: f64) -> String {
    format!("{v:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::tests::test_session;
    use ratatui::backend::TestBackend;

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    fn live_app() -> App {
        let explain = ExplainConfig {
            num_samples: 200,
            ..ExplainConfig::default()
        };
        App::new(test_session(), FeatureInput::default(), explain, PathBuf::from("unused.html"))
    }

    #[test]
    fn placeholder_predict_keeps_awaiting_message() {
        let mut app = App::placeholder(FeatureInput::default());
        assert!(screen_text(&mut app).contains(AWAITING));

        assert!(!app.handle_key(KeyCode::Char('p')));
        assert!(app.output.is_none());
        assert!(screen_text(&mut app).contains(AWAITING));
        assert!(screen_text(&mut app).contains("Predict (p)"));
    }

    #[test]
    fn predict_fills_result_panel() {
        let mut app = live_app();
        app.handle_key(KeyCode::Char('p'));
        let output = app.output.as_ref().unwrap();
        assert_eq!(output.prediction.label, HazardClass::Hazardous);
        assert_eq!(output.explanation.features.len(), 4);
        assert!(screen_text(&mut app).contains("Hazardous! This NEO"));
    }

    #[test]
    fn arrows_step_and_enter_edits() {
        let mut app = live_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Right);
        app.handle_key(KeyCode::Right);
        assert_eq!(app.input.estimated_diameter_max, 0.12);

        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected_field, 3);

        app.handle_key(KeyCode::Enter);
        for c in "750000".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        // `q` is ignored while editing.
        assert!(!app.handle_key(KeyCode::Char('q')));
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.input.miss_distance, 750_000.0);

        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Char('x'));
        app.handle_key(KeyCode::Enter);
        assert!(app.status.starts_with("Invalid number"));
        assert_eq!(app.input.miss_distance, 750_000.0);

        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn changing_an_input_clears_the_result() {
        let mut app = live_app();
        app.handle_key(KeyCode::Char('p'));
        assert!(app.output.is_some());

        app.handle_key(KeyCode::Enter);
        for c in "25".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.input.absolute_magnitude, 25.0);
        assert!(app.output.is_none());
        assert!(screen_text(&mut app).contains(AWAITING));

        app.handle_key(KeyCode::Char('p'));
        assert!(app.output.is_some());
        app.handle_key(KeyCode::Left);
        assert!(app.output.is_none());
        app.handle_key(KeyCode::Char('h'));
        assert!(app.status.starts_with("Nothing to export"));
    }

    #[test]
    fn html_requires_a_prediction() {
        let mut app = live_app();
        app.html_path = std::env::temp_dir().join(format!("neo_tui_{}.html", std::process::id()));
        app.handle_key(KeyCode::Char('h'));
        assert!(app.status.starts_with("Nothing to export"));

        app.handle_key(KeyCode::Char('p'));
        app.handle_key(KeyCode::Char('h'));
        assert!(app.status.starts_with("Wrote HTML report"));
        assert!(app.html_path.exists());
        let _ = std::fs::remove_file(&app.html_path);
    }

    #[test]
    fn values_use_step_precision() {
        assert_eq!(fmt_value(22.0, 0.1), "22.0");
        assert_eq!(fmt_value(0.1, 0.01), "0.10");
        assert_eq!(fmt_value(500_000.0, 1000.0), "500000");
    }
}
