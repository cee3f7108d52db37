//! Ratatui-based terminal UI.
//!
//! The TUI loads the dataset once, then renders the fitted curve next to the fit
//! statistics. Keys: `m` cycles the model, `r` toggles the reference curve,
//! `q`/`Esc` quits.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::app::pipeline::{self, RunOutput};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::io::ingest::IngestedData;
use crate::plot::PlotData;

mod plotters_chart;

use plotters_chart::FallPlottersChart;

const X_LABEL: &str = "time (s)";
const Y_LABEL: &str = "height (m)";

/// Start the TUI.
pub fn run(config: FitConfig) -> Result<(), AppError> {
    // Load before touching the terminal so input errors print normally.
    let ingest = pipeline::load_data(&config)?;
    let mut app = App::new(config, ingest);

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::input(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::input(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::input(format!("Failed to enter alternate screen: {e}")));
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

struct App {
    config: FitConfig,
    ingest: IngestedData,
    run: Option<RunOutput>,
    plot: Option<PlotData>,
    status: String,
}

impl App {
    fn new(config: FitConfig, ingest: IngestedData) -> Self {
        let mut app = Self {
            config,
            ingest,
            run: None,
            plot: None,
            status: String::new(),
        };
        app.refit();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::input(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::input(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::input(format!("Event read error: {e}")))? {
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

    /// Returns `true` when the app should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('m') => {
                self.config.model_spec = self.config.model_spec.next();
                self.refit();
            }
            KeyCode::Char('r') => {
                self.config.reference_curve = !self.config.reference_curve;
                self.rebuild_plot();
                self.status = if self.config.reference_curve {
                    format!("reference curve on (g = {})", self.config.g_ref)
                } else {
                    "reference curve off".to_string()
                };
            }
            _ => {}
        }
        false
    }

    /// Refit with the current model spec. A failed fit keeps the previous result
    /// on screen and reports the error in the status line.
    fn refit(&mut self) {
        match pipeline::run_fit_with_data(&self.config, self.ingest.clone()) {
            Ok(run) => {
                self.status = format!(
                    "model: {} -> {}",
                    self.config.model_spec.display_name(),
                    run.selection.best.model.kind.display_name()
                );
                self.run = Some(run);
                self.rebuild_plot();
            }
            Err(e) => {
                tracing::warn!("refit failed: {e}");
                self.status = format!("model: {} failed: {e}", self.config.model_spec.display_name());
            }
        }
    }

    fn rebuild_plot(&mut self) {
        self.plot = self.run.as_ref().map(|run| {
            PlotData::from_fit(
                &run.ingest.observations,
                &run.selection.best,
                self.config.g_ref,
                self.config.reference_curve,
            )
        });
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let model_name = self
            .run
            .as_ref()
            .map(|r| r.selection.best.model.kind.display_name())
            .unwrap_or("-");

        let lines = vec![
            Line::from(vec![
                Span::styled("fall", Style::default().fg(Color::Cyan)),
                Span::raw(" free-fall fit"),
            ]),
            Line::from(Span::styled(
                format!(
                    "source: {} | n={} | model: {} -> {model_name}",
                    self.ingest.source,
                    self.ingest.rows_used,
                    self.config.model_spec.display_name(),
                ),
                Style::default().fg(Color::Gray),
            )),
        ];

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(40)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_stats(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Fit").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(plot) = &self.plot else {
            let msg = Paragraph::new("No fit available.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let (x0, x1) = plot.x_bounds();
        let (y0, y1) = plot.y_bounds(0.05);
        let x_bounds = [x0, x1];
        let y_bounds = [y0, y1];

        let (chart_rect, insets) = chart_layout(inner);
        let widget = FallPlottersChart {
            curve: &plot.curve,
            points: &plot.points,
            reference: plot.reference.as_deref(),
            x_bounds,
            y_bounds,
            x_label: X_LABEL,
            y_label: Y_LABEL,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, x_bounds, y_bounds);
        }
    }

    fn draw_stats(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Statistics").borders(Borders::ALL);
        let Some(run) = &self.run else {
            frame.render_widget(Paragraph::new("-").block(block), area);
            return;
        };

        let fit = &run.selection.best;
        let kind = fit.model.kind;
        let mut lines: Vec<Line> = Vec::new();

        if let Some(plot) = &self.plot {
            for l in plot.annotation_lines() {
                lines.push(Line::from(l));
            }
        }
        lines.push(Line::from(""));

        for (i, name) in kind.param_names().iter().enumerate() {
            lines.push(Line::from(format!(
                "{name:<2} = {:.5} ± {:.5} {}",
                fit.model.values[i],
                fit.model.std_errors[i],
                kind.param_units()[i]
            )));
        }
        lines.push(Line::from(format!("RMSE = {:.6} m", fit.quality.rmse)));
        lines.push(Line::from(format!("iterations = {}", fit.quality.iterations)));

        if run.selection.fits.len() > 1 {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "BIC",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for f in &run.selection.fits {
                let marker = if f.model.kind == kind { "*" } else { " " };
                lines.push(Line::from(format!(
                    "{marker} {:<18} {:.2}",
                    f.model.kind.display_name(),
                    f.quality.bic
                )));
            }
        }

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "m model  r reference  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = format!("{x_val:.2}");
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = format!("{y_val:.2}");
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(X_LABEL)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(Y_LABEL).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelKind, ModelSpec};

    fn demo_app() -> App {
        let config = FitConfig::default();
        let ingest = pipeline::load_data(&config).unwrap();
        App::new(config, ingest)
    }

    #[test]
    fn model_key_cycles_and_refits() {
        let mut app = demo_app();
        assert_eq!(app.run.as_ref().unwrap().selection.best.model.kind, ModelKind::FreeFall);

        assert!(!app.handle_key(KeyCode::Char('m')));
        assert_eq!(app.config.model_spec, ModelSpec::Offset);
        assert_eq!(app.run.as_ref().unwrap().selection.best.model.kind, ModelKind::Offset);
        assert!(app.status.contains("free-fall + offset"));
    }

    #[test]
    fn reference_key_toggles_curve() {
        let mut app = demo_app();
        assert!(app.plot.as_ref().unwrap().reference.is_none());

        app.handle_key(KeyCode::Char('r'));
        assert!(app.plot.as_ref().unwrap().reference.is_some());

        app.handle_key(KeyCode::Char('r'));
        assert!(app.plot.as_ref().unwrap().reference.is_none());
    }

    #[test]
    fn quit_keys() {
        let mut app = demo_app();
        assert!(app.handle_key(KeyCode::Char('q')));
        assert!(app.handle_key(KeyCode::Esc));
    }
}
