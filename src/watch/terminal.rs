//! Terminal ownership
//!
//! The render loop is the only terminal writer. A blocking line prompt on
//! the keyboard thread borrows the terminal through a [`PromptLease`]:
//!
//! 1. set `input_modal` so the render loop stops drawing
//! 2. take the [`RenderGate`], which waits out a frame already in progress
//! 3. leave the alternate screen and raw mode, read a line
//! 4. on drop: restore modes, clear `input_modal`, request a full redraw

use std::io::{self, BufRead, Stdout, Write};

use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::{Mutex, MutexGuard};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::warn;

use crate::error::{Result, SenseiError};
use crate::session::SharedSession;

pub type WatchTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Raw mode + alternate screen for the lifetime of the guard
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().map_err(|e| SenseiError::Terminal {
            reason: format!("Failed to enable raw mode: {}", e),
        })?;
        // From here on, Drop undoes whatever succeeded
        let guard = Self { active: true };

        execute!(io::stdout(), EnterAlternateScreen, Hide).map_err(|e| SenseiError::Terminal {
            reason: format!("Failed to enter alternate screen: {}", e),
        })?;

        Ok(guard)
    }

    /// Terminal bound to stdout
    pub fn terminal(&self) -> Result<WatchTerminal> {
        Terminal::new(CrosstermBackend::new(io::stdout())).map_err(|e| SenseiError::Terminal {
            reason: format!("Failed to create terminal: {}", e),
        })
    }

    /// Restore the original terminal mode. Idempotent.
    pub fn restore(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Held for the duration of each frame draw
#[derive(Debug, Default)]
pub struct RenderGate {
    draw: Mutex<()>,
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self) -> MutexGuard<'_, ()> {
        self.draw.lock()
    }
}

/// How a prompt yields and reclaims the terminal
pub trait PromptTerminal: Send + Sync {
    /// Leave the full-screen mode so line input is echoed normally
    fn suspend(&self) -> io::Result<()>;
    /// Re-enter full-screen mode
    fn resume(&self) -> io::Result<()>;
    /// Print `prompt` and read one line (without the newline)
    fn read_line(&self, prompt: &str) -> io::Result<String>;
}

/// Prompt on the controlling terminal via crossterm
#[derive(Debug, Default)]
pub struct CrosstermPrompt;

impl PromptTerminal for CrosstermPrompt {
    fn suspend(&self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen, Show)
    }

    fn resume(&self) -> io::Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, Hide)
    }

    fn read_line(&self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Scoped loan of the terminal to a blocking prompt
pub struct PromptLease<'a> {
    session: &'a SharedSession,
    gate: &'a RenderGate,
    prompt: &'a dyn PromptTerminal,
}

impl<'a> PromptLease<'a> {
    pub fn acquire(
        session: &'a SharedSession,
        gate: &'a RenderGate,
        prompt: &'a dyn PromptTerminal,
    ) -> Self {
        session.lock().input_modal = true;
        {
            let _frame = gate.hold();
            if let Err(e) = prompt.suspend() {
                warn!(error = %e, "Failed to suspend terminal for prompt");
            }
        }
        Self {
            session,
            gate,
            prompt,
        }
    }

    pub fn read_line(&self, prompt: &str) -> io::Result<String> {
        self.prompt.read_line(prompt)
    }
}

impl Drop for PromptLease<'_> {
    fn drop(&mut self) {
        {
            let _frame = self.gate.hold();
            if let Err(e) = self.prompt.resume() {
                warn!(error = %e, "Failed to resume terminal after prompt");
            }
        }
        let mut session = self.session.lock();
        session.input_modal = false;
        session.needs_clear = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingPrompt {
        calls: Mutex<Vec<&'static str>>,
        modal_seen: Mutex<Option<bool>>,
        session: Mutex<Option<SharedSession>>,
    }

    impl PromptTerminal for RecordingPrompt {
        fn suspend(&self) -> io::Result<()> {
            self.calls.lock().push("suspend");
            Ok(())
        }

        fn resume(&self) -> io::Result<()> {
            self.calls.lock().push("resume");
            Ok(())
        }

        fn read_line(&self, _prompt: &str) -> io::Result<String> {
            self.calls.lock().push("read");
            if let Some(session) = self.session.lock().as_ref() {
                *self.modal_seen.lock() = Some(session.lock().input_modal);
            }
            Ok("why?".into())
        }
    }

    #[test]
    fn test_lease_sets_and_clears_input_modal() {
        let session = SessionState::new("k", "py").shared();
        let gate = RenderGate::new();
        let prompt = RecordingPrompt::default();
        *prompt.session.lock() = Some(Arc::clone(&session));

        {
            let lease = PromptLease::acquire(&session, &gate, &prompt);
            assert_eq!(lease.read_line("> ").unwrap(), "why?");
        }

        assert_eq!(*prompt.modal_seen.lock(), Some(true));
        assert_eq!(*prompt.calls.lock(), vec!["suspend", "read", "resume"]);
        let state = session.lock();
        assert!(!state.input_modal);
        assert!(state.needs_clear);
    }

    #[test]
    fn test_lease_waits_for_frame_in_progress() {
        let session = SessionState::new("k", "py").shared();
        let gate = Arc::new(RenderGate::new());
        let frame = gate.hold();

        let (s, g) = (Arc::clone(&session), Arc::clone(&gate));
        let prompter = std::thread::spawn(move || {
            let prompt = RecordingPrompt::default();
            let _lease = PromptLease::acquire(&s, &g, &prompt);
            let calls = prompt.calls.lock().clone();
            calls
        });

        // Modal is raised before the gate is taken
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(session.lock().input_modal);
        drop(frame);

        assert_eq!(prompter.join().unwrap(), vec!["suspend"]);
        assert!(!session.lock().input_modal);
    }
}
