//! Check Runner
//!
//! The one "run checks" operation shared by the file watcher and the
//! keyboard. A run goes `Idle -> Acquiring -> Running -> Reporting -> Idle`.
//!
//! At most one run is in flight: the run lock is only ever taken with
//! `try_lock`, and a caller that loses the race returns `None` without
//! spawning anything. There is no queue.

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::state::SharedSession;
use crate::check::{extract_failure_digest, ExecutionResult, FailureDigest, RunMode, TestExecutor};

/// Typed result of one run; `digest` and `signature` are `None` on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub result: ExecutionResult,
    pub digest: Option<FailureDigest>,
    pub signature: Option<String>,
}

impl RunOutcome {
    /// Attach a digest to a finished execution.
    ///
    /// Single-test reruns key the signature on the requested test so the
    /// repeat counter tracks that test even when its output is unparseable.
    pub fn from_result(result: ExecutionResult, single_test: Option<&str>) -> Self {
        if result.passed() {
            return Self {
                result,
                digest: None,
                signature: None,
            };
        }

        let mut digest = extract_failure_digest(&result.combined_output);
        let signature = match single_test {
            Some(name) => {
                if digest.is_placeholder() {
                    let parsed = digest;
                    digest = FailureDigest {
                        location: parsed.location,
                        snippet: parsed.snippet,
                        ..FailureDigest::for_test(name)
                    };
                }
                name.to_string()
            }
            None => digest.signature(),
        };

        Self {
            result,
            digest: Some(digest),
            signature: Some(signature),
        }
    }

    pub fn passed(&self) -> bool {
        self.digest.is_none()
    }
}

/// Shared handle; cheap to clone into each agent
#[derive(Clone)]
pub struct CheckRunner {
    session: SharedSession,
    executor: Arc<TestExecutor>,
    run_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl CheckRunner {
    pub fn new(session: SharedSession, executor: TestExecutor, shutdown: CancellationToken) -> Self {
        Self {
            session,
            executor: Arc::new(executor),
            run_lock: Arc::new(Mutex::new(())),
            shutdown,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Run the suite (or one test) and report into the session.
    ///
    /// Returns `None` without spawning when shutting down, paused, or when
    /// another run holds the lock.
    pub fn run_checks(&self, single_test: Option<&str>) -> Option<RunOutcome> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        {
            let mut session = self.session.lock();
            if session.paused {
                session.set_toast("Paused - press p to resume");
                return None;
            }
        }

        let Some(_run) = self.run_lock.try_lock() else {
            debug!("Run already in flight, skipping");
            return None;
        };
        self.session.lock().begin_run();
        let _running = RunningGuard(&self.session);

        info!(
            command = %self.executor.command_line(single_test),
            "Running tests"
        );
        let result = self.executor.run(single_test, RunMode::Watch);
        let outcome = RunOutcome::from_result(result, single_test);
        info!(
            passed = outcome.passed(),
            exit_code = outcome.result.exit_code,
            duration_ms = outcome.result.duration.as_millis() as u64,
            "Test run finished"
        );

        self.report(&outcome);
        Some(outcome)
    }

    /// Rerun only the last failing test, when one is known
    pub fn rerun_last_failure(&self) -> Option<RunOutcome> {
        let target = {
            let mut session = self.session.lock();
            let target = session
                .last_failure
                .as_ref()
                .and_then(|d| d.rerun_target())
                .map(str::to_string);
            if target.is_none() {
                session.set_toast("No failing test to rerun");
            }
            target?
        };
        self.run_checks(Some(&target))
    }

    fn report(&self, outcome: &RunOutcome) {
        let mut session = self.session.lock();
        let at = Local::now();
        match (&outcome.digest, &outcome.signature) {
            (Some(digest), Some(signature)) => session.report_fail(
                digest.clone(),
                signature.clone(),
                outcome.result.duration,
                at,
            ),
            _ => session.report_pass(outcome.result.duration, at),
        }
    }
}

/// Resets `running_tests` on every exit path, unwinding included
struct RunningGuard<'a>(&'a SharedSession);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.0.lock();
        session.running_tests = false;
        if session.last_status == super::RunStatus::Running {
            session.last_status = super::RunStatus::Idle;
        }
    }
}
