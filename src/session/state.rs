//! Session State
//!
//! The single shared record of one watch session. Producers (watcher and
//! keyboard threads) write into it through [`CheckRunner`] and hotkey
//! handlers; the render loop only takes snapshots.
//!
//! Locking rule: hold the mutex for field updates and snapshots only,
//! never across a process spawn, an HTTP call or a terminal draw.
//!
//! [`CheckRunner`]: super::CheckRunner

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::check::FailureDigest;
use crate::hint::HintBlock;
use crate::util::constants::{HISTORY_CAPACITY, RESULT_TOAST_DURATION, TOAST_DURATION};
use crate::util::{TICK_ACTIVE, TICK_IDLE};

/// Session state shared by the supervisor and its agents
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Outcome of the most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Idle => "Idle",
            RunStatus::Running => "Running",
            RunStatus::Passed => "Passed",
            RunStatus::Failed => "Failed",
        }
    }
}

/// One entry of the pass/fail strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMark {
    Pass,
    Fail,
}

impl HistoryMark {
    pub fn symbol(&self) -> char {
        match self {
            HistoryMark::Pass => '✓',
            HistoryMark::Fail => '✗',
        }
    }
}

/// Bounded ring of recent results, oldest evicted first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRing {
    marks: VecDeque<HistoryMark>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            marks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, mark: HistoryMark) {
        if self.capacity == 0 {
            return;
        }
        while self.marks.len() >= self.capacity {
            self.marks.pop_front();
        }
        self.marks.push_back(mark);
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = HistoryMark> + '_ {
        self.marks.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<HistoryMark> {
        self.iter().collect()
    }

    /// Space-separated symbols, oldest first (`✓ ✗ ✓`)
    pub fn symbols(&self) -> String {
        self.iter()
            .map(|m| m.symbol().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

/// Transient one-line notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

impl Toast {
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    /// Kata directory name, shown in the banner
    pub kata_name: String,
    /// Tracked source extension without the dot
    pub extension: String,

    pub elapsed: Duration,
    last_tick: Instant,
    /// Render tick counter, drives spinner frames
    pub frame: u64,

    pub paused: bool,
    pub running_tests: bool,
    pub input_modal: bool,

    pub last_status: RunStatus,
    pub last_checked_at: Option<DateTime<Local>>,
    pub last_duration: Option<Duration>,
    pub history: HistoryRing,
    /// Runs reported this session (the history ring only keeps the last few)
    pub run_count: u64,

    pub last_failure: Option<FailureDigest>,
    pub last_failure_signature: Option<String>,
    pub repeat_failure_count: u32,

    pub toast: Option<Toast>,
    pub hint_panel: Option<HintBlock>,

    /// Ask the render loop to clear the terminal before the next frame
    pub needs_clear: bool,
    /// Last frame that failed to draw
    pub render_error: Option<String>,
}

impl SessionState {
    pub fn new(kata_name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            kata_name: kata_name.into(),
            extension: extension.into(),
            elapsed: Duration::ZERO,
            last_tick: Instant::now(),
            frame: 0,
            paused: false,
            running_tests: false,
            input_modal: false,
            last_status: RunStatus::Idle,
            last_checked_at: None,
            last_duration: None,
            history: HistoryRing::default(),
            run_count: 0,
            last_failure: None,
            last_failure_signature: None,
            repeat_failure_count: 0,
            toast: None,
            hint_panel: None,
            needs_clear: false,
            render_error: None,
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Advance timers: accumulate elapsed unless paused, expire the toast.
    pub fn tick(&mut self, now: Instant) {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        if !self.paused {
            self.elapsed += delta;
        }
        if self.toast.as_ref().is_some_and(|t| t.is_expired(now)) {
            self.toast = None;
        }
        self.frame = self.frame.wrapping_add(1);
    }

    /// Interval until the next render tick
    pub fn tick_interval(&self) -> Duration {
        if self.running_tests {
            TICK_ACTIVE
        } else {
            TICK_IDLE
        }
    }

    /// Flip pause; returns the new value
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.set_toast(if self.paused { "Paused" } else { "Resumed" });
        self.paused
    }

    pub fn set_toast(&mut self, message: impl Into<String>) {
        self.set_toast_for(message, TOAST_DURATION);
    }

    pub fn set_toast_for(&mut self, message: impl Into<String>, ttl: Duration) {
        self.toast = Some(Toast {
            message: message.into(),
            expires_at: Instant::now() + ttl,
        });
    }

    /// Toast text if still live at `now`
    pub fn active_toast(&self, now: Instant) -> Option<&str> {
        self.toast
            .as_ref()
            .filter(|t| !t.is_expired(now))
            .map(|t| t.message.as_str())
    }

    /// Clear-screen hotkey: drop the hint panel and request a full redraw
    pub fn clear_screen(&mut self) {
        self.hint_panel = None;
        self.render_error = None;
        self.needs_clear = true;
        self.set_toast("Cleared");
    }

    /// Mark a run as in flight (run lock already held)
    pub fn begin_run(&mut self) {
        self.running_tests = true;
        self.last_status = RunStatus::Running;
    }

    /// Record a green run
    pub fn report_pass(&mut self, duration: Duration, at: DateTime<Local>) {
        self.finish_run(HistoryMark::Pass, duration, at);
        self.last_status = RunStatus::Passed;
        self.last_failure = None;
        self.last_failure_signature = None;
        self.repeat_failure_count = 0;
        self.set_toast_for("✓ Passed", RESULT_TOAST_DURATION);
    }

    /// Record a red run; same signature as the previous failure bumps the
    /// repeat counter, anything else restarts it at 1.
    pub fn report_fail(
        &mut self,
        digest: FailureDigest,
        signature: String,
        duration: Duration,
        at: DateTime<Local>,
    ) {
        self.finish_run(HistoryMark::Fail, duration, at);
        self.last_status = RunStatus::Failed;

        if self.last_failure_signature.as_deref() == Some(signature.as_str()) {
            self.repeat_failure_count = self.repeat_failure_count.saturating_add(1);
        } else {
            self.repeat_failure_count = 1;
            self.last_failure_signature = Some(signature);
        }
        self.last_failure = Some(digest);
        self.set_toast_for("✗ Failed", RESULT_TOAST_DURATION);
    }

    fn finish_run(&mut self, mark: HistoryMark, duration: Duration, at: DateTime<Local>) {
        self.history.push(mark);
        self.run_count += 1;
        self.last_duration = Some(duration);
        self.last_checked_at = Some(at);
        self.hint_panel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::extract_failure_digest;
    use pretty_assertions::assert_eq;

    fn fail(state: &mut SessionState, output: &str) {
        let digest = extract_failure_digest(output);
        let signature = digest.signature();
        state.report_fail(digest, signature, Duration::from_millis(300), Local::now());
    }

    #[test]
    fn test_history_ring_evicts_oldest() {
        let mut ring = HistoryRing::new(6);
        for _ in 0..6 {
            ring.push(HistoryMark::Pass);
        }
        ring.push(HistoryMark::Fail);
        assert_eq!(ring.len(), 6);
        assert_eq!(ring.to_vec().last(), Some(&HistoryMark::Fail));
        assert_eq!(ring.symbols(), "✓ ✓ ✓ ✓ ✓ ✗");
    }

    #[test]
    fn test_history_ring_never_exceeds_capacity() {
        let mut ring = HistoryRing::new(3);
        for i in 0..50 {
            ring.push(if i % 2 == 0 { HistoryMark::Pass } else { HistoryMark::Fail });
            assert!(ring.len() <= ring.capacity());
        }
        // 47, 48, 49 → Fail, Pass, Fail
        assert_eq!(
            ring.to_vec(),
            vec![HistoryMark::Fail, HistoryMark::Pass, HistoryMark::Fail]
        );
    }

    #[test]
    fn test_repeat_failure_counts_up_then_resets() {
        let mut state = SessionState::new("sum", "py");
        fail(&mut state, "FAIL: test_x ... AssertionError\n");
        assert_eq!(state.repeat_failure_count, 1);
        fail(&mut state, "FAIL: test_x ... AssertionError\n");
        fail(&mut state, "FAIL: test_x ... AssertionError\n");
        assert_eq!(state.repeat_failure_count, 3);

        fail(&mut state, "FAIL: test_y ... AssertionError\n");
        assert_eq!(state.repeat_failure_count, 1);
        assert_eq!(state.last_failure.as_ref().unwrap().test_name, "test_y");
    }

    #[test]
    fn test_pass_clears_failure_fields() {
        let mut state = SessionState::new("sum", "py");
        fail(&mut state, "FAIL: test_x ... AssertionError\n");
        state.report_pass(Duration::from_millis(120), Local::now());

        assert_eq!(state.last_status, RunStatus::Passed);
        assert!(state.last_failure.is_none());
        assert!(state.last_failure_signature.is_none());
        assert_eq!(state.repeat_failure_count, 0);
        assert_eq!(state.history.symbols(), "✗ ✓");
        assert_eq!(state.run_count, 2);
        assert_eq!(state.active_toast(Instant::now()), Some("✓ Passed"));
    }

    #[test]
    fn test_elapsed_frozen_while_paused() {
        let mut state = SessionState::new("sum", "py");
        let start = Instant::now();
        state.last_tick = start;

        state.tick(start + Duration::from_secs(2));
        assert_eq!(state.elapsed, Duration::from_secs(2));

        state.toggle_pause();
        state.tick(start + Duration::from_secs(10));
        assert_eq!(state.elapsed, Duration::from_secs(2));

        state.toggle_pause();
        state.tick(start + Duration::from_secs(11));
        assert_eq!(state.elapsed, Duration::from_secs(3));
    }

    #[test]
    fn test_toast_expires_on_tick() {
        let mut state = SessionState::new("sum", "py");
        state.set_toast_for("hello", Duration::from_millis(10));
        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(state.active_toast(later), None);
        state.tick(later);
        assert!(state.toast.is_none());
    }

    #[test]
    fn test_tick_interval_follows_running_flag() {
        let mut state = SessionState::new("sum", "py");
        assert_eq!(state.tick_interval(), TICK_IDLE);
        state.begin_run();
        assert_eq!(state.tick_interval(), TICK_ACTIVE);
        assert_eq!(state.last_status, RunStatus::Running);
    }

    #[test]
    fn test_clear_screen_requests_redraw() {
        let mut state = SessionState::new("sum", "py");
        state.render_error = Some("boom".into());
        state.clear_screen();
        assert!(state.needs_clear);
        assert!(state.hint_panel.is_none());
        assert!(state.render_error.is_none());
        assert_eq!(state.active_toast(Instant::now()), Some("Cleared"));
    }
}
