//! Session Module - shared state of one watch session
//!
//! - `state`: [`SessionState`] and its parts (history ring, toast, status)
//! - `runner`: [`CheckRunner`], the serialized "run checks" operation

mod runner;
mod state;

pub use runner::{CheckRunner, RunOutcome};
pub use state::{HistoryMark, HistoryRing, RunStatus, SessionState, SharedSession, Toast};
