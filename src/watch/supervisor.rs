//! Watch Supervisor
//!
//! Owns the session and wires the agents together:
//!
//! ```text
//! FileWatchAgent ──┐                       ┌── RenderLoop (main task)
//!                  ├─▶ CheckRunner ─▶ SessionState ◀─┤
//! KeyboardAgent  ──┘                       └── HintAdvisor (keyboard thread)
//! ```
//!
//! Shutdown (quit hotkey or ^C from the OS) cancels one token. The render
//! loop returns, the watcher is stopped, the keyboard thread is joined with
//! a bound, and the terminal guard restores the original mode. Every step
//! tolerates having already happened.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::keyboard::{HotkeyHandler, KeyboardAgent};
use super::render::run_render_loop;
use super::terminal::{CrosstermPrompt, RenderGate, TerminalGuard};
use super::watcher::{ChangeTrigger, FileWatchAgent};
use crate::check::TestExecutor;
use crate::config::SenseiConfig;
use crate::error::Result;
use crate::hint::{create_service, HintAdvisor, OfflineService, RateLimiter, ReasoningService};
use crate::kata::Kata;
use crate::session::{CheckRunner, RunStatus, SessionState, SharedSession};
use crate::util::AGENT_JOIN_TIMEOUT;

/// What the session looked like when it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub elapsed: Duration,
    pub runs: u64,
    pub last_status: RunStatus,
}

pub struct WatchSupervisor {
    kata: Kata,
    config: SenseiConfig,
    session: SharedSession,
    shutdown: CancellationToken,
}

impl WatchSupervisor {
    pub fn new(kata: Kata, config: SenseiConfig) -> Self {
        let session = SessionState::new(kata.slug.clone(), config.watch.extension.clone()).shared();
        Self {
            kata,
            config,
            session,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Cancelling this token ends the session
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until quit. Setup failures (watch, terminal) are returned.
    pub async fn run(self) -> Result<SessionSummary> {
        let executor = TestExecutor::from_settings(&self.config.check, &self.kata.dir)?;
        let runner = CheckRunner::new(self.session(), executor, self.shutdown.clone());

        let watcher = FileWatchAgent::start(
            &self.kata.dir,
            &self.config.watch.extension,
            self.config.watch.debounce(),
            ChangeTrigger::new(runner.clone(), self.shutdown.clone()),
        )?;
        let watcher = Arc::new(Mutex::new(watcher));

        let mut guard = TerminalGuard::enter()?;
        let mut terminal = guard.terminal()?;
        let gate = Arc::new(RenderGate::new());

        let handler = HotkeyHandler {
            session: self.session(),
            runner,
            advisor: Arc::new(HintAdvisor::new(self.reasoning_service())),
            limiter: RateLimiter::from_settings(&self.config.paths.notes_root, &self.config.hints),
            project: self.kata.slug.clone(),
            kata_dir: self.kata.dir.clone(),
            gate: Arc::clone(&gate),
            prompt: Arc::new(CrosstermPrompt),
            shutdown: self.shutdown.clone(),
            watcher: Some(Arc::clone(&watcher)),
            runtime: Handle::current(),
        };
        let mut keyboard = KeyboardAgent::spawn(handler)?;

        let signal_token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Interrupt received");
                    }
                    signal_token.cancel();
                }
                _ = signal_token.cancelled() => {}
            }
        });

        info!(kata = %self.kata.slug, dir = %self.kata.dir.display(), "Watch session started");
        run_render_loop(&mut terminal, self.session(), &gate, self.shutdown.clone()).await;

        // Shutdown, in order; each step is a no-op if already done
        self.shutdown.cancel();
        watcher.lock().stop();
        keyboard.join(AGENT_JOIN_TIMEOUT);
        drop(terminal);
        guard.restore();

        let summary = {
            let state = self.session.lock();
            SessionSummary {
                elapsed: state.elapsed,
                runs: state.run_count,
                last_status: state.last_status,
            }
        };
        info!(elapsed_secs = summary.elapsed.as_secs(), "Watch session ended");
        Ok(summary)
    }

    fn reasoning_service(&self) -> Arc<dyn ReasoningService> {
        match create_service(&self.config.hints) {
            Ok(service) => service,
            Err(e) => {
                warn!(error = %e, "Reasoning service unavailable, hints will use the fallback");
                Arc::new(OfflineService)
            }
        }
    }
}
