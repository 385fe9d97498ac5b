//! Check Module - running a kata's tests and summarising failures
//!
//! - `executor`: spawns the test command and captures an [`ExecutionResult`]
//! - `digest`: pure extraction of a [`FailureDigest`] from raw output

mod digest;
mod executor;

pub use digest::{extract_failure_digest, FailureDigest, UNKNOWN_TEST};
pub use executor::{ExecutionResult, RunMode, TestExecutor, SPAWN_FAILURE_EXIT_CODE};
