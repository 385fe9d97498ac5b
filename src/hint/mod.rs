//! Hint Module - on-demand guidance from a reasoning service
//!
//! - `service`: [`ReasoningService`] trait with Ollama, OpenRouter and offline backends
//! - `advisor`: prompt assembly, fallback and sanitizing into a [`HintBlock`] or [`Diagnosis`]
//! - `rate_limit`: persisted per-project cooldown

mod advisor;
mod rate_limit;
pub mod service;

pub use advisor::{
    sanitize_suggestions, Diagnosis, HintAdvisor, HintBlock, HintContext, HintSource,
    DIAGNOSIS_UNAVAILABLE, FALLBACK_SUGGESTIONS,
};
pub use rate_limit::{RateDecision, RateLimiter, HINT_LOG_FILE};
pub use service::{create_service, OfflineService, ReasoningService};
