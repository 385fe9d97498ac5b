//! Hint Rate Limiter
//!
//! Per-project hint timestamps persisted as JSON in
//! `<notes_root>/hints_log.json`:
//!
//! ```json
//! { "kata-a": ["2026-03-01T10:00:00.120+01:00", "..."] }
//! ```
//!
//! Every read prunes entries older than 24h, dated in the future (clock
//! changes, hand edits) or unparsable, and writes the pruned map back. Only the short cooldown normally bites; the
//! daily cap is configured high but still enforced.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat};
use tracing::{debug, warn};

use crate::config::HintSettings;
use crate::error::Result;
use crate::util::constants::{HINT_COOLDOWN, HINT_MAX_PER_DAY, HINT_RETENTION};

pub const HINT_LOG_FILE: &str = "hints_log.json";

type HintLog = BTreeMap<String, Vec<String>>;

/// Answer to "may this project ask for a hint now?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds to wait before asking again; 0 when allowed
    pub wait_secs: u64,
    /// Hints left in the current 24h window
    pub remaining: usize,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    path: PathBuf,
    cooldown: Duration,
    max_per_day: usize,
}

impl RateLimiter {
    pub fn new(notes_root: &Path) -> Self {
        Self {
            path: notes_root.join(HINT_LOG_FILE),
            cooldown: HINT_COOLDOWN,
            max_per_day: HINT_MAX_PER_DAY,
        }
    }

    pub fn from_settings(notes_root: &Path, settings: &HintSettings) -> Self {
        Self::new(notes_root).with_limits(settings.cooldown(), settings.max_per_day)
    }

    pub fn with_limits(mut self, cooldown: Duration, max_per_day: usize) -> Self {
        self.cooldown = cooldown;
        self.max_per_day = max_per_day;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn check(&self, project: &str) -> Result<RateDecision> {
        self.check_at(project, Local::now())
    }

    pub fn record(&self, project: &str) -> Result<()> {
        self.record_at(project, Local::now())
    }

    /// Check, and record the use when allowed
    pub fn check_and_record(&self, project: &str) -> Result<RateDecision> {
        self.check_and_record_at(project, Local::now())
    }

    pub fn check_and_record_at(&self, project: &str, now: DateTime<Local>) -> Result<RateDecision> {
        let decision = self.check_at(project, now)?;
        if decision.allowed {
            self.record_at(project, now)?;
        }
        Ok(decision)
    }

    /// Load, prune, rewrite, then decide for `project` at `now`
    pub fn check_at(&self, project: &str, now: DateTime<Local>) -> Result<RateDecision> {
        let log = self.load_pruned(now);
        self.save(&log)?;

        let mut stamps: Vec<DateTime<Local>> = log
            .get(project)
            .map(|entries| entries.iter().filter_map(|ts| parse_timestamp(ts)).collect())
            .unwrap_or_default();
        stamps.sort();

        let used = stamps.len();
        let remaining = self.max_per_day.saturating_sub(used);

        if let Some(last) = stamps.last() {
            let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.cooldown {
                let wait_secs = ceil_secs(self.cooldown - elapsed);
                debug!(project, wait_secs, "Hint denied by cooldown");
                return Ok(RateDecision {
                    allowed: false,
                    wait_secs,
                    remaining,
                });
            }
        }

        if used >= self.max_per_day {
            // Free again once the oldest entry leaves the window
            let wait_secs = stamps
                .first()
                .and_then(|oldest| (*oldest + retention() - now).to_std().ok())
                .map(ceil_secs)
                .unwrap_or(1);
            debug!(project, wait_secs, "Hint denied by daily cap");
            return Ok(RateDecision {
                allowed: false,
                wait_secs,
                remaining: 0,
            });
        }

        Ok(RateDecision {
            allowed: true,
            wait_secs: 0,
            remaining,
        })
    }

    /// Append a use for `project` at `now`
    pub fn record_at(&self, project: &str, now: DateTime<Local>) -> Result<()> {
        let mut log = self.load_pruned(now);
        log.entry(project.to_string())
            .or_default()
            .push(now.to_rfc3339_opts(SecondsFormat::Millis, false));
        self.save(&log)
    }

    /// Hints left today for `project`
    pub fn remaining(&self, project: &str) -> usize {
        let log = self.load_pruned(Local::now());
        let used = log.get(project).map_or(0, Vec::len);
        self.max_per_day.saturating_sub(used)
    }

    fn load_pruned(&self, now: DateTime<Local>) -> HintLog {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return HintLog::new(),
        };
        let log: HintLog = match serde_json::from_str(&content) {
            Ok(log) => log,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt hint log, starting fresh");
                return HintLog::new();
            }
        };
        prune(log, now)
    }

    fn save(&self, log: &HintLog) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(log)?)?;
        Ok(())
    }
}

fn retention() -> chrono::Duration {
    chrono::Duration::from_std(HINT_RETENTION).unwrap_or_else(|_| chrono::Duration::days(1))
}

/// Keep entries inside `[now - retention, now]`, then drop empty projects
fn prune(log: HintLog, now: DateTime<Local>) -> HintLog {
    let window = retention();
    log.into_iter()
        .filter_map(|(project, entries)| {
            let kept: Vec<String> = entries
                .into_iter()
                .filter(|ts| {
                    parse_timestamp(ts).is_some_and(|dt| dt <= now && now - dt <= window)
                })
                .collect();
            (!kept.is_empty()).then_some((project, kept))
        })
        .collect()
}

/// RFC 3339, or a legacy naive local `YYYY-MM-DDTHH:MM:SS[.fff]`
fn parse_timestamp(ts: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Local));
    }
    ts.parse::<NaiveDateTime>()
        .ok()?
        .and_local_timezone(Local)
        .earliest()
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
