//! Keyboard Agent
//!
//! Reads single keys on its own OS thread and dispatches hotkeys. The read
//! is a short `event::poll` so the shutdown token is rechecked before every
//! retry. Handlers run on this thread: a manual run or a hint request
//! blocks further keys until it finishes, never the render loop.
//!
//! | Key      | Action                          |
//! |----------|---------------------------------|
//! | `p`      | toggle pause                    |
//! | `r`      | run the suite now               |
//! | `f`      | rerun the last failing test     |
//! | `a`      | ask for a hint                  |
//! | `c`      | clear screen and hint panel     |
//! | `q`, ^C  | quit                            |

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::terminal::{PromptLease, PromptTerminal, RenderGate};
use super::watcher::FileWatchAgent;
use crate::error::Result;
use crate::hint::{HintAdvisor, HintContext, RateLimiter};
use crate::session::{CheckRunner, SharedSession};
use crate::util::KEYBOARD_POLL;

pub const ASK_PROMPT: &str = "Ask Sensei (Enter to cancel): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hotkey {
    TogglePause,
    RunNow,
    RerunFailure,
    AskHint,
    ClearScreen,
    Quit,
}

impl Hotkey {
    /// Map a key press; releases and repeats are ignored
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            // Raw mode swallows SIGINT, so ^C arrives as a key
            return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')).then_some(Hotkey::Quit);
        }
        match key.code {
            KeyCode::Char(c) => Self::from_char(c),
            _ => None,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(Hotkey::TogglePause),
            'r' => Some(Hotkey::RunNow),
            'f' => Some(Hotkey::RerunFailure),
            'a' => Some(Hotkey::AskHint),
            'c' => Some(Hotkey::ClearScreen),
            'q' => Some(Hotkey::Quit),
            _ => None,
        }
    }
}

/// Whether the agent keeps reading after a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything a hotkey can touch
pub struct HotkeyHandler {
    pub session: SharedSession,
    pub runner: CheckRunner,
    pub advisor: Arc<HintAdvisor>,
    pub limiter: RateLimiter,
    /// Rate-limit key (kata slug)
    pub project: String,
    pub kata_dir: PathBuf,
    pub gate: Arc<RenderGate>,
    pub prompt: Arc<dyn PromptTerminal>,
    pub shutdown: CancellationToken,
    pub watcher: Option<Arc<Mutex<FileWatchAgent>>>,
    pub runtime: Handle,
}

impl HotkeyHandler {
    pub fn handle(&self, key: Hotkey) -> Flow {
        debug!(?key, "Hotkey");
        match key {
            Hotkey::TogglePause => {
                let paused = self.session.lock().toggle_pause();
                info!(paused, "Pause toggled");
            }
            Hotkey::RunNow => {
                self.runner.run_checks(None);
            }
            Hotkey::RerunFailure => {
                self.runner.rerun_last_failure();
            }
            Hotkey::AskHint => self.ask_hint(),
            Hotkey::ClearScreen => self.session.lock().clear_screen(),
            Hotkey::Quit => {
                self.quit();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Run a handler, turning a panic into a toast
    pub fn dispatch(&self, key: Hotkey) -> Flow {
        match panic::catch_unwind(AssertUnwindSafe(|| self.handle(key))) {
            Ok(flow) => flow,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(?key, %reason, "Hotkey handler panicked");
                self.session.lock().set_toast(format!("Hotkey failed: {reason}"));
                Flow::Continue
            }
        }
    }

    fn quit(&self) {
        info!("Quit requested");
        self.shutdown.cancel();
        if let Some(watcher) = &self.watcher {
            watcher.lock().stop();
        }
    }

    fn ask_hint(&self) {
        match self.limiter.check(&self.project) {
            Ok(decision) if !decision.allowed => {
                self.session
                    .lock()
                    .set_toast(format!("Debouncing... wait {}s", decision.wait_secs));
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Hint rate limit check failed, continuing"),
        }
        self.session.lock().set_toast("Ask Sensei");

        let answer = {
            let lease = PromptLease::acquire(&self.session, &self.gate, self.prompt.as_ref());
            lease.read_line(ASK_PROMPT)
        };
        let question = match answer {
            Ok(line) => line.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Failed to read hint question");
                String::new()
            }
        };
        if question.is_empty() {
            self.session.lock().set_toast("Ask cancelled");
            return;
        }

        self.session.lock().set_toast("Consulting Sensei...");
        let ctx = HintContext::capture(&self.session, &self.kata_dir);
        let block = self.runtime.block_on(self.advisor.build_hint(&question, &ctx));

        if let Err(e) = self.limiter.record(&self.project) {
            warn!(error = %e, "Failed to record hint use");
        }

        let mut session = self.session.lock();
        session.hint_panel = Some(block);
        session.set_toast("Sensei response ready");
    }
}

pub struct KeyboardAgent {
    thread: Option<JoinHandle<()>>,
    done_rx: Option<Receiver<()>>,
}

impl KeyboardAgent {
    /// Start reading keys until quit or `shutdown`
    pub fn spawn(handler: HotkeyHandler) -> Result<Self> {
        let (done_tx, done_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("sensei-keyboard".into())
            .spawn(move || {
                read_keys(&handler);
                let _ = done_tx.send(());
            })?;
        Ok(Self {
            thread: Some(thread),
            done_rx: Some(done_rx),
        })
    }

    /// Join with an upper bound; a thread stuck in a hint request is detached.
    /// Returns whether the thread finished.
    pub fn join(&mut self, timeout: Duration) -> bool {
        let (Some(thread), Some(done_rx)) = (self.thread.take(), self.done_rx.take()) else {
            return true;
        };
        match done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Keyboard thread did not stop in time, detaching");
                false
            }
        }
    }
}

/// Message carried by a caught panic
pub(super) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn read_keys(handler: &HotkeyHandler) {
    debug!("Keyboard agent started");
    while !handler.shutdown.is_cancelled() {
        match event::poll(KEYBOARD_POLL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(error = %e, "Keyboard poll failed");
                thread::sleep(KEYBOARD_POLL);
                continue;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "Keyboard read failed");
                continue;
            }
        };
        if let Some(hotkey) = Hotkey::from_key(&key) {
            if handler.dispatch(hotkey) == Flow::Quit {
                break;
            }
        }
    }
    debug!("Keyboard agent stopped");
}
