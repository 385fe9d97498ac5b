//! Hint rate limiter integration tests
//!
//! Uses the real clock and the on-disk log under a temp notes root.

use std::fs;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local, SecondsFormat};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

use sensei::hint::{RateLimiter, HINT_LOG_FILE};

#[test]
fn test_second_ask_within_a_second_is_denied() {
    let notes = TempDir::new().unwrap();
    let limiter = RateLimiter::new(notes.path());

    let first = limiter.check_and_record("kata-a").unwrap();
    let second = limiter.check_and_record("kata-a").unwrap();

    assert!(first.allowed);
    assert!(!second.allowed);
    assert!(second.wait_secs > 0);
}

#[test]
fn test_log_is_shared_between_instances() {
    let notes = TempDir::new().unwrap();
    RateLimiter::new(notes.path()).check_and_record("kata-a").unwrap();

    // A fresh limiter (new session, or `sensei hint`) reads the same file
    let decision = RateLimiter::new(notes.path()).check("kata-a").unwrap();
    assert!(!decision.allowed);

    let raw: Value =
        serde_json::from_str(&fs::read_to_string(notes.path().join(HINT_LOG_FILE)).unwrap()).unwrap();
    assert_eq!(raw["kata-a"].as_array().unwrap().len(), 1);
}

#[test]
fn test_short_cooldown_elapses() {
    let notes = TempDir::new().unwrap();
    let limiter =
        RateLimiter::new(notes.path()).with_limits(Duration::from_millis(200), 100);

    assert!(limiter.check_and_record("kata-a").unwrap().allowed);
    assert!(!limiter.check_and_record("kata-a").unwrap().allowed);

    std::thread::sleep(Duration::from_millis(300));
    assert!(limiter.check_and_record("kata-a").unwrap().allowed);
    assert_eq!(limiter.remaining("kata-a"), 98);
}

#[test]
fn test_day_old_entries_are_pruned_on_read() {
    let notes = TempDir::new().unwrap();
    let stale = (Local::now() - ChronoDuration::hours(25)).to_rfc3339_opts(SecondsFormat::Millis, false);
    fs::write(
        notes.path().join(HINT_LOG_FILE),
        json!({ "kata-a": [stale], "kata-b": [stale] }).to_string(),
    )
    .unwrap();

    let decision = RateLimiter::new(notes.path()).check("kata-a").unwrap();
    assert!(decision.allowed);

    let raw: Value =
        serde_json::from_str(&fs::read_to_string(notes.path().join(HINT_LOG_FILE)).unwrap()).unwrap();
    let total: usize = raw
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_array().map_or(0, Vec::len))
        .sum();
    assert_eq!(total, 0);
}
