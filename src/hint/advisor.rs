//! Hint Advisor
//!
//! Builds a bounded prompt from the session context, asks the reasoning
//! service, and turns the reply into a [`HintBlock`]. Any service failure
//! (timeout, transport, non-2xx, empty or malformed body) falls back to a
//! fixed suggestion list, so asking for a hint always produces one.
//!
//! A red `check` gets a one-sentence [`Diagnosis`] the same way, with a
//! fixed message as its fallback.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::{info, warn};

use super::service::ReasoningService;
use crate::check::FailureDigest;
use crate::error::SenseiError;
use crate::session::{HistoryMark, SharedSession};
use crate::util::constants::HINT_CONTEXT_MAX_CHARS;
use crate::util::{summarize_text, tail_chars, truncate_chars, HINT_TIMEOUT};

/// Deterministic suggestions used when the service cannot answer
pub const FALLBACK_SUGGESTIONS: [&str; 3] = [
    "Run the existing tests to see failures before coding.",
    "Check inputs: empty, None, wrong types, and out-of-range values.",
    "Log one insight to LOG.md after each change to keep momentum.",
];

const SYSTEM_INSTRUCTION: &str = "You are a helpful coding tutor. Based on the student's \
question and test failures, provide 2-3 SHORT, actionable suggestions to help them debug. \
Be specific and practical. Focus on what they should check or try next, not the full solution.";

const DIAGNOSIS_INSTRUCTION: &str = "You are a senior engineer. Analyze the failing test \
output and give a ONE sentence hint on what might be wrong. Do not give the full code fix. \
Focus on the logic error.";

/// Shown when no diagnosis could be obtained
pub const DIAGNOSIS_UNAVAILABLE: &str =
    "Could not reach the reasoning service for a diagnosis. Check the output above.";

/// Only the end of the output is sent; that is where the traceback is
const DIAGNOSIS_OUTPUT_CHARS: usize = 2000;

const MISSION_FILE: &str = "MISSION.md";
const MISSION_EXCERPT_CHARS: usize = 500;
const FAILURE_SNIPPET_CHARS: usize = 200;
const PANEL_SNIPPET_CHARS: usize = 160;

static BOILERPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)re-?read your question").unwrap());

/// Where the suggestions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintSource {
    Service,
    Fallback,
}

/// Snapshot of what the advisor may tell the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HintContext {
    pub kata_name: String,
    pub last_failure: Option<FailureDigest>,
    pub history: Vec<HistoryMark>,
    /// Leading excerpt of MISSION.md
    pub mission: Option<String>,
}

impl HintContext {
    /// Snapshot the session under its lock, then read the mission outside it
    pub fn capture(session: &SharedSession, kata_dir: &Path) -> Self {
        let mut ctx = {
            let session = session.lock();
            Self {
                kata_name: session.kata_name.clone(),
                last_failure: session.last_failure.clone(),
                history: session.history.to_vec(),
                mission: None,
            }
        };
        ctx.mission = read_mission(kata_dir);
        ctx
    }

    /// Context for a kata outside a watch session (no run history)
    pub fn for_kata(kata_dir: &Path) -> Self {
        Self {
            kata_name: kata_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            mission: read_mission(kata_dir),
            ..Default::default()
        }
    }

    fn history_symbols(&self) -> String {
        self.history
            .iter()
            .map(|m| m.symbol().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn read_mission(kata_dir: &Path) -> Option<String> {
    let text = std::fs::read_to_string(kata_dir.join(MISSION_FILE)).ok()?;
    Some(truncate_chars(&text, MISSION_EXCERPT_CHARS).to_string())
}

/// Reply to a red `check`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub text: String,
    pub source: HintSource,
}

/// Renderable hint response
#[derive(Debug, Clone, PartialEq)]
pub struct HintBlock {
    pub question: String,
    pub failure: Option<FailureDigest>,
    pub recent: Vec<HistoryMark>,
    /// Sanitized lines without bullet markers
    pub suggestions: Vec<String>,
    pub source: HintSource,
    pub created_at: DateTime<Local>,
}

impl HintBlock {
    /// Titled sections in display order; empty sections are omitted
    pub fn sections(&self) -> Vec<(&'static str, Vec<String>)> {
        let mut sections = Vec::new();

        if !self.question.is_empty() {
            sections.push(("Your Question", vec![self.question.clone()]));
        }

        if let Some(failure) = &self.failure {
            let mut lines: Vec<String> = [&failure.test_name, &failure.location]
                .into_iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect();
            let snippet = summarize_text(&failure.snippet, PANEL_SNIPPET_CHARS);
            if !snippet.is_empty() {
                lines.push(snippet);
            }
            if !lines.is_empty() {
                sections.push(("Last Failure", lines));
            }
        }

        if !self.recent.is_empty() {
            let marks = self
                .recent
                .iter()
                .map(|m| m.symbol().to_string())
                .collect::<Vec<_>>()
                .join(" ");
            sections.push(("Recent Results", vec![marks]));
        }

        if !self.suggestions.is_empty() {
            sections.push((
                "Suggestions",
                self.suggestions.iter().map(|s| format!("• {s}")).collect(),
            ));
        }

        sections
    }

    /// Plain-text rendering for non-interactive output
    pub fn to_text(&self) -> String {
        self.sections()
            .into_iter()
            .map(|(title, lines)| format!("{title}\n{}", lines.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Drop boilerplate lines, strip bullet markers and blank lines
pub fn sanitize_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !BOILERPLATE.is_match(line))
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

pub struct HintAdvisor {
    service: Arc<dyn ReasoningService>,
    timeout: Duration,
}

impl HintAdvisor {
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self {
            service,
            timeout: HINT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// System and user messages exactly as they would be sent
    pub fn prompt_preview(&self, question: &str, ctx: &HintContext) -> (String, String) {
        (SYSTEM_INSTRUCTION.to_string(), user_context(question, ctx))
    }

    /// Ask the service for suggestions, falling back on any failure
    pub async fn build_hint(&self, question: &str, ctx: &HintContext) -> HintBlock {
        let (system, user) = self.prompt_preview(question, ctx);

        let (suggestions, source) = match self.ask(&system, &user).await {
            Some(text) => {
                let lines = sanitize_suggestions(&text);
                if lines.is_empty() {
                    warn!(service = self.service.name(), "Reply had no usable lines, using fallback");
                    (fallback_suggestions(), HintSource::Fallback)
                } else {
                    (lines, HintSource::Service)
                }
            }
            None => (fallback_suggestions(), HintSource::Fallback),
        };
        info!(?source, count = suggestions.len(), "Hint ready");

        HintBlock {
            question: question.trim().to_string(),
            failure: ctx.last_failure.clone(),
            recent: ctx.history.clone(),
            suggestions,
            source,
            created_at: Local::now(),
        }
    }

    /// One-sentence read of a failing run, from the tail of its output
    pub async fn diagnose(&self, kata_name: &str, output: &str) -> Diagnosis {
        let user = format!(
            "Kata: {kata_name}\nOutput:\n{}",
            tail_chars(output, DIAGNOSIS_OUTPUT_CHARS)
        );
        match self.ask(DIAGNOSIS_INSTRUCTION, &user).await {
            Some(text) => Diagnosis {
                text: text.split_whitespace().collect::<Vec<_>>().join(" "),
                source: HintSource::Service,
            },
            None => Diagnosis {
                text: DIAGNOSIS_UNAVAILABLE.to_string(),
                source: HintSource::Fallback,
            },
        }
    }

    /// Bounded service call; `None` after logging any failure
    async fn ask(&self, system: &str, user: &str) -> Option<String> {
        let err = match tokio::time::timeout(self.timeout, self.service.complete(system, user)).await {
            Ok(Ok(text)) => return Some(text),
            Ok(Err(e)) => self.unavailable(format!("{e:#}")),
            Err(_) => self.unavailable(format!("no reply within {}s", self.timeout.as_secs())),
        };
        warn!(error = %err, "Using fallback");
        None
    }

    fn unavailable(&self, reason: String) -> SenseiError {
        SenseiError::ReasoningUnavailable {
            service: self.service.name().to_string(),
            reason,
        }
    }
}

fn fallback_suggestions() -> Vec<String> {
    FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// User message, bounded to `HINT_CONTEXT_MAX_CHARS`
fn user_context(question: &str, ctx: &HintContext) -> String {
    let mut out = String::new();
    let question = question.trim();
    let _ = writeln!(
        out,
        "Question: {}",
        if question.is_empty() { "What should I do next?" } else { question }
    );
    if !ctx.kata_name.is_empty() {
        let _ = writeln!(out, "Kata: {}", ctx.kata_name);
    }
    if let Some(failure) = &ctx.last_failure {
        let _ = writeln!(out, "Last failure: {}", failure.test_name);
        let _ = writeln!(
            out,
            "Error: {}",
            truncate_chars(&failure.snippet, FAILURE_SNIPPET_CHARS)
        );
    }
    if !ctx.history.is_empty() {
        let _ = writeln!(out, "Recent results: {}", ctx.history_symbols());
    }
    if let Some(mission) = &ctx.mission {
        let _ = writeln!(out, "Mission:\n{mission}");
    }
    truncate_chars(&out, HINT_CONTEXT_MAX_CHARS).to_string()
}
