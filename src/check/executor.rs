//! Test Executor
//!
//! Spawns the kata's test command as a child process in the kata directory
//! and captures its combined output. Both pipes are drained on helper
//! threads so a chatty test suite cannot fill a pipe buffer and stall.
//!
//! Watch-triggered runs wait to completion. Preview runs get a hard
//! timeout, after which the child is killed and reaped.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::config::CheckSettings;
use crate::error::{Result, SenseiError};

/// Exit code used when the test command could not be started
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// How long to wait for pipe readers after a timed-out child was killed
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// How a run is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run to completion (watch-triggered and hotkey runs)
    Watch,
    /// Kill the child after the given duration
    Preview(Duration),
}

/// Outcome of one test command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    /// stdout followed by stderr
    pub combined_output: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Runs the configured test command for one kata
#[derive(Debug, Clone)]
pub struct TestExecutor {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl TestExecutor {
    /// Build from an argv (`program arg...`) and the kata directory
    pub fn new(command: &[String], workdir: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| SenseiError::ConfigError {
            reason: "check.command must name a program".into(),
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            workdir: workdir.into(),
        })
    }

    pub fn from_settings(settings: &CheckSettings, workdir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(&settings.command, workdir)
    }

    /// Human-readable command line, as it would be typed
    pub fn command_line(&self, single_test: Option<&str>) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.args.iter().map(String::as_str));
        parts.extend(single_test);
        parts.join(" ")
    }

    /// Run the suite, or a single test when a name is given.
    ///
    /// Never fails: a spawn error is folded into a failed result with
    /// exit code 127 so callers report it like any other red run.
    pub fn run(&self, single_test: Option<&str>, mode: RunMode) -> ExecutionResult {
        let start = Instant::now();
        debug!(command = %self.command_line(single_test), ?mode, "Spawning test run");

        let child = match self.spawn(single_test) {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Test command failed to start");
                return ExecutionResult {
                    exit_code: SPAWN_FAILURE_EXIT_CODE,
                    combined_output: e.to_string(),
                    duration: start.elapsed(),
                    timed_out: false,
                };
            }
        };

        self.collect(child, mode, start)
    }

    fn spawn(&self, single_test: Option<&str>) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(single_test)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.spawn().map_err(|e| SenseiError::SpawnFailed {
            command: self.command_line(single_test),
            reason: e.to_string(),
        })
    }

    fn collect(&self, mut child: Child, mode: RunMode, start: Instant) -> ExecutionResult {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = match mode {
            RunMode::Watch => (child.wait(), false),
            RunMode::Preview(limit) => match child.wait_timeout(limit) {
                Ok(Some(status)) => (Ok(status), false),
                Ok(None) => {
                    warn!(timeout_secs = limit.as_secs_f64(), "Preview run timed out, killing");
                    let _ = child.kill();
                    (child.wait(), true)
                }
                Err(e) => (Err(e), false),
            },
        };

        // A killed child may leave grandchildren holding the pipes open
        let grace = timed_out.then_some(DRAIN_GRACE);
        let mut combined_output = stdout.finish(grace);
        combined_output.push_str(&stderr.finish(grace));

        let exit_code = match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                warn!(error = %e, "Failed to wait for test run");
                combined_output.push_str(&format!("\nfailed to wait for test run: {e}"));
                -1
            }
        };

        if timed_out {
            if let RunMode::Preview(limit) = mode {
                combined_output.push_str(&format!(
                    "\n... test run timed out after {}s",
                    limit.as_secs()
                ));
            }
        }

        let duration = start.elapsed();
        debug!(exit_code, timed_out, duration_ms = duration.as_millis() as u64, "Test run finished");

        ExecutionResult {
            exit_code,
            combined_output,
            duration,
            timed_out,
        }
    }
}

/// Pending contents of one child pipe
struct Drain(Option<mpsc::Receiver<String>>);

impl Drain {
    fn finish(self, grace: Option<Duration>) -> String {
        let Some(rx) = self.0 else {
            return String::new();
        };
        let received = match grace {
            Some(limit) => rx.recv_timeout(limit).ok(),
            None => rx.recv().ok(),
        };
        received.unwrap_or_default()
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    let Some(mut pipe) = pipe else {
        return Drain(None);
    };
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    Drain(Some(rx))
}
