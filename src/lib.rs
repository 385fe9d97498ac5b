//! Sensei - watch-mode supervisor for katas
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        INTERACTIVE LAYER                     │
//! │  watch/     Supervisor, watcher, keyboard, render loop       │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  session/   SessionState, CheckRunner (serialized runs)      │
//! │  hint/      HintAdvisor, RateLimiter, reasoning services     │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  check/     TestExecutor, failure digest extraction          │
//! │  kata       Kata directory resolution                        │
//! │  util/      Constants, text summaries                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`watch`] | Raw-mode session: file events, hotkeys, frame drawing |
//! | [`session`] | Shared session state and the single-flight test run |
//! | [`hint`] | Hint prompts, fallback, per-project cooldown |
//! | [`check`] | Spawning the test command, parsing failures |
//! | [`kata`] | Resolving a slug or the cwd to a kata |
//! | [`util`] | Timing constants, bounded text helpers |
//! | [`error`] | Error types with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// INTERACTIVE LAYER - the watch session
// ═══════════════════════════════════════════════════════════════
pub mod watch;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - session state, hints
// ═══════════════════════════════════════════════════════════════
pub mod hint;
pub mod session;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - test execution, kata lookup
// ═══════════════════════════════════════════════════════════════
pub mod check;
pub mod kata;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{FixSuggestion, Result, SenseiError};

// Config types
pub use config::SenseiConfig;

// Kata
pub use kata::Kata;

// Check types
pub use check::{extract_failure_digest, ExecutionResult, FailureDigest, RunMode, TestExecutor};

// Session types
pub use session::{CheckRunner, RunOutcome, RunStatus, SessionState, SharedSession};

// Hint types
pub use hint::{HintAdvisor, HintBlock, HintContext, RateLimiter, ReasoningService};

// Watch types
pub use watch::{SessionSummary, WatchSupervisor};
