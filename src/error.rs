// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Sensei Error Types with Error Codes
//!
//! Error code ranges:
//! - SENSEI-000-009: Project resolution errors
//! - SENSEI-010-019: Fatal session setup errors (watcher, terminal)
//! - SENSEI-020-029: Test execution errors
//! - SENSEI-030-039: Reasoning service / hint errors
//! - SENSEI-040-049: Config errors
//! - SENSEI-090-099: IO/JSON errors

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SenseiError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum SenseiError {
    // ═══════════════════════════════════════════
    // PROJECT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[SENSEI-001] Kata not found at {path}")]
    #[diagnostic(code(sensei::kata_not_found), help("Check the slug and --root"))]
    KataNotFound { path: String },

    #[error("[SENSEI-002] No 'tests' folder found in {path}")]
    #[diagnostic(
        code(sensei::not_a_kata),
        help("Run from a kata directory or pass its slug")
    )]
    NotAKata { path: String },

    // ═══════════════════════════════════════════
    // SETUP ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[SENSEI-010] Failed to watch {path}: {reason}")]
    #[diagnostic(code(sensei::watch_init))]
    WatchInit { path: String, reason: String },

    #[error("[SENSEI-011] Terminal error: {reason}")]
    #[diagnostic(code(sensei::terminal))]
    Terminal { reason: String },

    // ═══════════════════════════════════════════
    // TEST EXECUTION ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[SENSEI-020] Failed to spawn test command '{command}': {reason}")]
    #[diagnostic(code(sensei::spawn_failed))]
    SpawnFailed { command: String, reason: String },

    // ═══════════════════════════════════════════
    // HINT ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[SENSEI-030] Reasoning service '{service}' unavailable: {reason}")]
    #[diagnostic(code(sensei::reasoning_unavailable))]
    ReasoningUnavailable { service: String, reason: String },

    #[error("[SENSEI-031] Hint rate limited for '{project}': wait {wait_secs}s")]
    #[diagnostic(code(sensei::rate_limited))]
    RateLimited { project: String, wait_secs: u64 },

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[SENSEI-040] Config error: {reason}")]
    #[diagnostic(code(sensei::config))]
    ConfigError { reason: String },

    // ═══════════════════════════════════════════
    // IO ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[SENSEI-090] IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("[SENSEI-091] JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SenseiError {
    /// Get the error code (e.g., "SENSEI-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::KataNotFound { .. } => "SENSEI-001",
            Self::NotAKata { .. } => "SENSEI-002",
            Self::WatchInit { .. } => "SENSEI-010",
            Self::Terminal { .. } => "SENSEI-011",
            Self::SpawnFailed { .. } => "SENSEI-020",
            Self::ReasoningUnavailable { .. } => "SENSEI-030",
            Self::RateLimited { .. } => "SENSEI-031",
            Self::ConfigError { .. } => "SENSEI-040",
            Self::IoError(_) => "SENSEI-090",
            Self::JsonError(_) => "SENSEI-091",
        }
    }

    /// Check if error is recoverable (the session can keep going)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. } | Self::ReasoningUnavailable { .. } | Self::RateLimited { .. }
        )
    }
}

impl FixSuggestion for SenseiError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            SenseiError::KataNotFound { .. } => Some("Check the kata slug and the --root directory"),
            SenseiError::NotAKata { .. } => {
                Some("cd into a kata directory (one with a tests/ folder) or pass its slug")
            }
            SenseiError::WatchInit { .. } => {
                Some("Check the directory exists and the inotify watch limit is not exhausted")
            }
            SenseiError::Terminal { .. } => Some("Run sensei watch from an interactive terminal"),
            SenseiError::SpawnFailed { .. } => {
                Some("Check check.command in ~/.config/sensei/config.toml")
            }
            SenseiError::ReasoningUnavailable { .. } => {
                Some("Start Ollama, set SENSEI_API_KEY for OpenRouter, or use --offline")
            }
            SenseiError::RateLimited { .. } => Some("Wait a few seconds before asking again"),
            SenseiError::ConfigError { .. } => {
                Some("Check ~/.config/sensei/config.toml for syntax errors")
            }
            SenseiError::IoError(_) => Some("Check file permissions and paths"),
            SenseiError::JsonError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_kata_code_and_display() {
        let err = SenseiError::NotAKata {
            path: "/tmp/scratch".to_string(),
        };
        assert_eq!(err.code(), "SENSEI-002");
        let msg = err.to_string();
        assert!(msg.contains("[SENSEI-002]"));
        assert!(msg.contains("/tmp/scratch"));
    }

    #[test]
    fn test_watch_init_is_fatal() {
        let err = SenseiError::WatchInit {
            path: "/kata".to_string(),
            reason: "no space left".to_string(),
        };
        assert_eq!(err.code(), "SENSEI-010");
        assert!(!err.is_recoverable());
        assert!(err.fix_suggestion().unwrap().contains("inotify"));
    }

    #[test]
    fn test_reasoning_unavailable_is_recoverable() {
        let err = SenseiError::ReasoningUnavailable {
            service: "ollama".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_rate_limited_display() {
        let err = SenseiError::RateLimited {
            project: "kata-a".to_string(),
            wait_secs: 4,
        };
        assert_eq!(err.code(), "SENSEI-031");
        assert!(err.to_string().contains("wait 4s"));
    }

    #[test]
    fn test_io_error_from_std() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SenseiError = io.into();
        assert_eq!(err.code(), "SENSEI-090");
        assert!(err.fix_suggestion().is_some());
    }
}
