//! Render Loop
//!
//! Fixed-tick loop that snapshots [`SessionState`] into a [`FrameModel`]
//! and draws it with `Terminal::draw` (double-buffered, so a frame is never
//! half visible). The session mutex is released before drawing; the
//! [`RenderGate`] is held for the draw itself. A draw that errors or panics
//! is reported inline on the next frame and the loop backs off, then goes on.
//!
//! ```text
//! ┌ Sensei Watch ─────────────────────────────────────────┐
//! │ Current Kata > two-sum                         ⏱ 03:14 │
//! │ Edit any .py file to trigger tests.                    │
//! │ [p] pause  [r] run  [f] rerun failed  [a] ask  [c] ... │
//! └────────────────────────────────────────────────────────┘
//!  ✗ Test Failed (0.4s) at 14:03:07 [✓ ✓ ✗]  ×2 same failure
//! ┌ Last Failure ──────────────────────────────────────────┐
//! ┌ Sensei Response ───────────────────────────────────────┐
//!  Change detected in solution.py
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::keyboard::panic_reason;
use super::terminal::RenderGate;
use super::theme::{spinner_char, Theme, BRAILLE_SPINNER, PULSE_SPINNER};
use crate::check::FailureDigest;
use crate::hint::HintBlock;
use crate::session::{RunStatus, SessionState, SharedSession};
use crate::util::constants::RENDER_ERROR_BACKOFF;

const KEY_LEGEND: &str = "[p] pause  [r] run  [f] rerun failed  [a] ask  [c] clear  [q] quit";

/// Everything one frame needs, copied out of the session
#[derive(Debug, Clone, PartialEq)]
pub struct FrameModel {
    pub kata_name: String,
    pub extension: String,
    pub elapsed: Duration,
    pub paused: bool,
    pub running: bool,
    pub tick: u64,
    pub last_status: RunStatus,
    pub last_duration: Option<Duration>,
    pub last_checked_at: Option<DateTime<Local>>,
    pub history: String,
    pub repeat_failure_count: u32,
    pub last_failure: Option<FailureDigest>,
    pub hint: Option<HintBlock>,
    pub toast: Option<String>,
    pub render_error: Option<String>,
}

impl FrameModel {
    pub fn capture(state: &SessionState, now: Instant) -> Self {
        Self {
            kata_name: state.kata_name.clone(),
            extension: state.extension.clone(),
            elapsed: state.elapsed,
            paused: state.paused,
            running: state.running_tests,
            tick: state.frame,
            last_status: state.last_status,
            last_duration: state.last_duration,
            last_checked_at: state.last_checked_at,
            history: state.history.symbols(),
            repeat_failure_count: state.repeat_failure_count,
            last_failure: state.last_failure.clone(),
            hint: state.hint_panel.clone(),
            toast: state.active_toast(now).map(str::to_string),
            render_error: state.render_error.clone(),
        }
    }

    /// `MM:SS`, prefixed with `(paused)` while paused
    pub fn timer(&self) -> String {
        let secs = self.elapsed.as_secs();
        let clock = format!("{:02}:{:02}", secs / 60, secs % 60);
        if self.paused {
            format!("(paused) {clock}")
        } else {
            clock
        }
    }

    /// One-line run summary
    pub fn status_line(&self) -> String {
        if self.running {
            return format!("{} Running tests...", spinner_char(BRAILLE_SPINNER, self.tick));
        }
        match self.last_status {
            RunStatus::Passed | RunStatus::Failed => {
                let mut line = format!("Test {}", self.last_status.label());
                if let Some(d) = self.last_duration {
                    line.push_str(&format!(" ({:.1}s)", d.as_secs_f64()));
                }
                if let Some(at) = self.last_checked_at {
                    line.push_str(&format!(" at {}", at.format("%H:%M:%S")));
                }
                if !self.history.is_empty() {
                    line.push_str(&format!(" [{}]", self.history));
                }
                if self.last_status == RunStatus::Failed && self.repeat_failure_count > 1 {
                    line.push_str(&format!("  ×{} same failure", self.repeat_failure_count));
                }
                line
            }
            RunStatus::Idle | RunStatus::Running => {
                format!("{} Listening…", spinner_char(PULSE_SPINNER, self.tick))
            }
        }
    }

    fn status_color(&self, theme: &Theme) -> ratatui::style::Color {
        if self.running {
            return theme.status_running;
        }
        match self.last_status {
            RunStatus::Passed => theme.status_passed,
            RunStatus::Failed => theme.status_failed,
            _ if self.paused => theme.status_paused,
            _ => theme.status_idle,
        }
    }
}

/// Draw one full frame
pub fn draw_frame(frame: &mut Frame, model: &FrameModel, theme: &Theme) {
    let show_failure = model.last_status == RunStatus::Failed
        && !model.running
        && model.last_failure.is_some();
    let hint_lines = model.hint.as_ref().map(hint_text_lines);

    let mut constraints = vec![Constraint::Length(6), Constraint::Length(1)];
    if show_failure {
        constraints.push(Constraint::Length(6));
    }
    if let Some(lines) = &hint_lines {
        constraints.push(Constraint::Length((lines.len() as u16).saturating_add(2)));
    }
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Min(0));

    let areas = Layout::vertical(constraints).split(frame.area());
    let mut slot = areas.iter().copied();
    let mut next = || slot.next().unwrap_or_default();

    render_banner(frame, next(), model, theme);
    render_status(frame, next(), model, theme);
    if show_failure {
        if let Some(failure) = &model.last_failure {
            render_failure(frame, next(), failure, theme);
        }
    }
    if let Some(lines) = hint_lines {
        render_hint(frame, next(), lines, theme);
    }

    let toast_area = next();
    if let Some(toast) = &model.toast {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" {toast}"),
                Style::default().fg(theme.toast),
            ))),
            toast_area,
        );
    }

    let error_area = next();
    if let Some(err) = &model.render_error {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" Render error: {err}"),
                Style::default().fg(theme.error),
            ))),
            error_area,
        );
    }
}

fn render_banner(frame: &mut Frame, area: Rect, model: &FrameModel, theme: &Theme) {
    let timer_style = if model.paused {
        Style::default().fg(theme.status_paused)
    } else {
        Style::default().fg(theme.text_primary)
    };
    let lines = vec![
        Line::from(vec![
            Span::styled("Current Kata > ", theme.muted()),
            Span::styled(
                model.kata_name.clone(),
                Style::default()
                    .fg(theme.text_primary)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(format!("⏱ {}", model.timer()), timer_style)),
        Line::from(Span::styled(
            format!("Edit any .{} file to trigger tests.", model.extension),
            theme.muted(),
        )),
        Line::from(Span::styled(KEY_LEGEND, theme.muted())),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(Span::styled(" Sensei Watch ", theme.title_style()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status(frame: &mut Frame, area: Rect, model: &FrameModel, theme: &Theme) {
    let line = Line::from(Span::styled(
        format!(" {}", model.status_line()),
        Style::default()
            .fg(model.status_color(theme))
            .add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_failure(frame: &mut Frame, area: Rect, failure: &FailureDigest, theme: &Theme) {
    let mut lines = vec![Line::from(Span::styled(
        failure.test_name.clone(),
        theme.section_title(),
    ))];
    if !failure.location.is_empty() {
        lines.push(Line::from(Span::styled(failure.location.clone(), theme.muted())));
    }
    lines.extend(
        failure
            .snippet
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| Line::from(l.trim().to_string())),
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.failure_border))
        .title(" Last Failure ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

/// Section titles followed by their lines, blank line between sections
fn hint_text_lines(hint: &HintBlock) -> Vec<(bool, String)> {
    let mut out = Vec::new();
    for (i, (title, lines)) in hint.sections().into_iter().enumerate() {
        if i > 0 {
            out.push((false, String::new()));
        }
        out.push((true, title.to_string()));
        out.extend(lines.into_iter().map(|l| (false, l)));
    }
    out
}

fn render_hint(frame: &mut Frame, area: Rect, lines: Vec<(bool, String)>, theme: &Theme) {
    let lines: Vec<Line> = lines
        .into_iter()
        .map(|(is_title, text)| {
            if is_title {
                Line::from(Span::styled(text, theme.section_title()))
            } else {
                Line::from(text)
            }
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.hint_border))
        .title(Span::styled(" Sensei Response ", theme.title_style()));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

/// Where frames go
pub trait FrameSurface {
    fn clear(&mut self) -> Result<(), String>;
    fn draw_model(&mut self, model: &FrameModel, theme: &Theme) -> Result<(), String>;
}

impl<B: Backend> FrameSurface for Terminal<B> {
    fn clear(&mut self) -> Result<(), String> {
        Terminal::clear(self).map_err(|e| e.to_string())
    }

    fn draw_model(&mut self, model: &FrameModel, theme: &Theme) -> Result<(), String> {
        self.draw(|f| draw_frame(f, model, theme))
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Tick, snapshot and draw until `shutdown` is cancelled.
pub async fn run_render_loop<S: FrameSurface>(
    surface: &mut S,
    session: SharedSession,
    gate: &RenderGate,
    shutdown: CancellationToken,
) {
    let theme = Theme::default();
    debug!("Render loop started");

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let now = Instant::now();
        let (model, interval, clear) = {
            let mut state = session.lock();
            state.tick(now);
            if state.input_modal {
                (None, state.tick_interval(), false)
            } else {
                let clear = std::mem::take(&mut state.needs_clear);
                (Some(FrameModel::capture(&state, now)), state.tick_interval(), clear)
            }
        };

        let mut failed = false;
        if let Some(model) = model {
            let _frame = gate.hold();
            // A prompt may have taken over while we waited for the gate
            if !session.lock().input_modal {
                let drawn = panic::catch_unwind(AssertUnwindSafe(|| {
                    if clear {
                        let _ = surface.clear();
                    }
                    surface.draw_model(&model, &theme)
                }));
                let problem = match drawn {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(payload) => Some(format!("panic: {}", panic_reason(payload.as_ref()))),
                };
                if let Some(reason) = problem {
                    error!(error = %reason, "Failed to draw frame");
                    session.lock().render_error = Some(reason);
                    failed = true;
                }
            }
        }

        let pause = if failed { RENDER_ERROR_BACKOFF } else { interval };
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    debug!("Render loop stopped");
}
