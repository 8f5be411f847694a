//! Error types.
//!
//! The action engine itself has no recoverable errors: reducers are total and
//! misuse is a programming error. What remains is environment setup.

use thiserror::Error;

/// Failure to construct a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `TokioScheduler::current()` was called outside a tokio runtime.
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,
}
