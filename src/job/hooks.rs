//! Completion hooks, fired on the supervisor side.

use serde_json::Value;

/// Callbacks invoked once per job after the pool reports completion.
///
/// The defaults log a one-line summary. Implementations may customize the
/// message; they cannot change delivery semantics. Hooks always run on
/// the supervisor side, after `execute()` and before the outcome becomes
/// visible through result retrieval.
pub trait JobHooks: Send + Sync {
    /// The target returned `value`.
    fn on_success(&self, job_name: &str, value: &Value) {
        // A `message` field in the value gets surfaced in the summary.
        match value.get("message").and_then(Value::as_str) {
            Some(summary) => tracing::info!(job = job_name, summary, "Job finished"),
            None => tracing::info!(job = job_name, "Job finished"),
        }
    }

    /// The target faulted with `message`.
    fn on_error(&self, job_name: &str, message: &str) {
        tracing::warn!(job = job_name, error = message, "Job failed");
    }
}

/// The default hooks: log and nothing else.
pub struct LogHooks;

impl JobHooks for LogHooks {}
