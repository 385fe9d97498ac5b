//! File Watch Agent
//!
//! Watches the kata tree and turns bursts of source edits into test runs.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  notify callback thread          watcher worker thread           │
//! │  ├── filter kind + extension     ├── next_burst (quiet period)   │
//! │  ├── skip paths without metadata └── ChangeTrigger::fire          │
//! │  └── std mpsc::Sender  ───────────────▶ CheckRunner::run_checks   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Editors save as temp-file-then-rename, which shows up as several events
//! within a few milliseconds. The worker absorbs events until the channel
//! has been quiet for the debounce delay, then fires once. Events that pile
//! up while that run is in flight are dropped, not replayed afterwards.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SenseiError};
use crate::session::{CheckRunner, RunOutcome};
use crate::util::AGENT_JOIN_TIMEOUT;

/// Path of a relevant create/modify event, if any.
///
/// A path whose metadata cannot be read (already renamed away, permission
/// denied) is skipped.
pub fn relevant_path(event: &Event, extension: &str) -> Option<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return None;
    }
    event
        .paths
        .iter()
        .find(|path| has_extension(path, extension) && path.metadata().is_ok())
        .cloned()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// Discard events that queued up while a run was in flight
pub fn drain_pending(rx: &Receiver<PathBuf>) -> usize {
    rx.try_iter().count()
}

/// Block until the next burst has gone quiet for `quiet`.
///
/// Returns the last path of the burst, or `None` once the channel is closed
/// with nothing pending.
pub fn next_burst(rx: &Receiver<PathBuf>, quiet: Duration) -> Option<PathBuf> {
    let mut last = rx.recv().ok()?;
    loop {
        match rx.recv_timeout(quiet) {
            Ok(path) => last = path,
            Err(RecvTimeoutError::Timeout) => return Some(last),
            Err(RecvTimeoutError::Disconnected) => return Some(last),
        }
    }
}

/// What a debounced burst does: toast + one run, unless paused or stopping
#[derive(Clone)]
pub struct ChangeTrigger {
    runner: CheckRunner,
    shutdown: CancellationToken,
}

impl ChangeTrigger {
    pub fn new(runner: CheckRunner, shutdown: CancellationToken) -> Self {
        Self { runner, shutdown }
    }

    /// Fire for a burst ending at `path`; `None` when the burst was dropped
    /// or lost the run lock.
    pub fn fire(&self, path: &Path) -> Option<RunOutcome> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        {
            let mut session = self.runner.session().lock();
            if session.paused {
                debug!(path = %path.display(), "Paused, dropping change burst");
                return None;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            session.set_toast(format!("Change detected in {name}"));
        }
        self.runner.run_checks(None)
    }
}

pub struct FileWatchAgent {
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    done_rx: Option<Receiver<()>>,
    join_timeout: Duration,
}

impl FileWatchAgent {
    /// Start watching `root` recursively. A notify error here is fatal.
    pub fn start(
        root: &Path,
        extension: &str,
        debounce: Duration,
        trigger: ChangeTrigger,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<PathBuf>();
        let extension = extension.to_string();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if let Some(path) = relevant_path(&event, &extension) {
                        // Receiver gone means the agent is stopping
                        let _ = tx.send(path);
                    }
                }
                Err(e) => warn!(error = %e, "File watch error"),
            },
            Config::default(),
        )
        .map_err(|e| watch_init(root, e))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| watch_init(root, e))?;

        let (done_tx, done_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("sensei-watcher".into())
            .spawn(move || {
                while let Some(path) = next_burst(&rx, debounce) {
                    debug!(path = %path.display(), "Change burst settled");
                    trigger.fire(&path);
                    let dropped = drain_pending(&rx);
                    if dropped > 0 {
                        debug!(dropped, "Dropping events from during the run");
                    }
                }
                let _ = done_tx.send(());
            })?;

        debug!(root = %root.display(), "File watcher started");
        Ok(Self {
            watcher: Some(watcher),
            worker: Some(worker),
            done_rx: Some(done_rx),
            join_timeout: AGENT_JOIN_TIMEOUT,
        })
    }

    /// Stop watching and join the worker. Safe to call more than once.
    ///
    /// A worker still inside a test run is left to finish on its own once
    /// the join timeout passes.
    pub fn stop(&mut self) {
        // Dropping the watcher drops the sender and closes the channel
        if self.watcher.take().is_none() {
            return;
        }
        let (Some(worker), Some(done_rx)) = (self.worker.take(), self.done_rx.take()) else {
            return;
        };
        match done_rx.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                debug!("File watcher stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Watcher worker busy at shutdown, detaching");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for FileWatchAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch_init(root: &Path, e: notify::Error) -> SenseiError {
    SenseiError::WatchInit {
        path: root.display().to_string(),
        reason: e.to_string(),
    }
}
