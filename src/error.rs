//! Error types for the job engine.
//!
//! A fault raised inside a job target is *not* represented here: the
//! supervisor captures it as a [`crate::job::JobOutcome::Fault`] and files
//! it under the job's result key, so it reaches the caller as data rather
//! than as an error.

use std::time::Duration;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Flag error: {0}")]
    Flag(#[from] FlagError),

    #[error("Result error: {0}")]
    Result(#[from] ResultError),
}

/// Caller misuse detected synchronously at `submit`.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Result key must not be empty")]
    EmptyResultKey,

    #[error("Engine is stopped; job {name} was not enqueued")]
    EngineStopped { name: String },
}

/// Failure to start, attach to, or stop the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Supervisor {name} did not signal readiness within {timeout:?}")]
    StartupTimeout { name: String, timeout: Duration },

    #[error("Supervisor {name} is not running")]
    NotRunning { name: String },
}

/// Errors from the durable run-flag store.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("Flag {name} is not set")]
    NotFound { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from keyed result retrieval.
#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    #[error("No outcome stored under key {key} (never submitted, still running, or already taken)")]
    NotFound { key: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
