//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts, tick rates and limits
//! - `text`: Bounded summaries of test output and free text

pub mod constants;
mod text;

// Re-export public items
pub use constants::{
    CONNECT_TIMEOUT, DEBOUNCE_DELAY, HINT_TIMEOUT, HISTORY_CAPACITY, INFER_TIMEOUT,
    AGENT_JOIN_TIMEOUT, KEYBOARD_POLL, PREVIEW_TIMEOUT, TICK_ACTIVE, TICK_IDLE,
};
pub use text::{summarize_failure_output, summarize_text, tail_chars, truncate_chars};
