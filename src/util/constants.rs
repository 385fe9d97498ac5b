//! Centralized constants for the watch session
//!
//! All timeout, tick and limit values in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Render Loop
// ═══════════════════════════════════════════════════════════════

/// Tick interval while a test run is in flight (spinner animation)
pub const TICK_ACTIVE: Duration = Duration::from_millis(200);

/// Tick interval while idle
pub const TICK_IDLE: Duration = Duration::from_secs(1);

/// Pause after a failed frame before the next tick
pub const RENDER_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Default lifetime of a toast message
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

/// Lifetime of the pass/fail toast set after each run
pub const RESULT_TOAST_DURATION: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
// Agents
// ═══════════════════════════════════════════════════════════════

/// Quiet period that closes a burst of file events
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// How long the keyboard thread blocks per poll before rechecking shutdown
pub const KEYBOARD_POLL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for an agent thread at shutdown
pub const AGENT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════
// Test Execution
// ═══════════════════════════════════════════════════════════════

/// Hard timeout for ad-hoc preview runs (watch-triggered runs have none)
pub const PREVIEW_TIMEOUT: Duration = Duration::from_secs(20);

/// Runs kept in the pass/fail history strip
pub const HISTORY_CAPACITY: usize = 6;

/// Snippet bounds for a failure digest
pub const SNIPPET_MAX_LINES: usize = 6;
pub const SNIPPET_MAX_CHARS: usize = 600;

// ═══════════════════════════════════════════════════════════════
// Reasoning Service
// ═══════════════════════════════════════════════════════════════

/// Timeout for a single reasoning-service request
pub const INFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on an interactive hint, including the fallback decision
pub const HINT_TIMEOUT: Duration = Duration::from_secs(45);

/// Maximum size of the user context sent with a hint request
pub const HINT_CONTEXT_MAX_CHARS: usize = 2000;

/// Hint cooldown per project
pub const HINT_COOLDOWN: Duration = Duration::from_secs(5);

/// Daily hint cap per project (effectively unlimited)
pub const HINT_MAX_PER_DAY: usize = 9999;

/// Retention window of the persisted hint log
pub const HINT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
