//! Job descriptions — one unit of submitted work.

pub mod hooks;
pub mod outcome;

pub use hooks::{JobHooks, LogHooks};
pub use outcome::JobOutcome;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Error produced by a job target. Targets are caller code with arbitrary
/// failure modes, so the engine captures them type-erased; the message is
/// what survives into the stored outcome.
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

/// What a target returns: a JSON value or a fault.
pub type TargetResult = std::result::Result<Value, TargetError>;

/// The callable body of a job. Runs on a worker slot with the job's
/// positional and keyword arguments.
///
/// Any `Fn(&[Value], &Map<String, Value>) -> TargetResult` (including
/// plain `fn` items) implements this automatically.
pub trait JobTarget: Send + Sync {
    fn run(&self, args: &[Value], kwargs: &Map<String, Value>) -> TargetResult;
}

impl<F> JobTarget for F
where
    F: Fn(&[Value], &Map<String, Value>) -> TargetResult + Send + Sync,
{
    fn run(&self, args: &[Value], kwargs: &Map<String, Value>) -> TargetResult {
        self(args, kwargs)
    }
}

/// Caller-chosen key under which a job's outcome is filed and later
/// retrieved. Composite keys ("speed+segment") are the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultKey(String);

impl ResultKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResultKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ResultKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// An inert description of one unit of work: name, result key, target,
/// positional args, keyword args, and the hooks fired on the supervisor
/// side once the outcome is known.
///
/// Immutable once constructed. The caller owns it until submission, after
/// which execution ownership passes to the supervisor.
pub struct Job {
    id: Uuid,
    name: String,
    result_key: ResultKey,
    target: Arc<dyn JobTarget>,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    hooks: Arc<dyn JobHooks>,
}

impl Job {
    /// Describe a unit of work. Hooks default to [`LogHooks`].
    pub fn new(
        name: impl Into<String>,
        result_key: impl Into<ResultKey>,
        target: Arc<dyn JobTarget>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            result_key: result_key.into(),
            target,
            args,
            kwargs,
            hooks: Arc::new(LogHooks),
        }
    }

    /// Replace the completion hooks. Delivery semantics are unchanged:
    /// hooks still fire exactly once, on the supervisor side, after the
    /// pool reports completion.
    pub fn with_hooks(mut self, hooks: Arc<dyn JobHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Per-job identifier used in log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result_key(&self) -> &ResultKey {
        &self.result_key
    }

    pub(crate) fn hooks(&self) -> Arc<dyn JobHooks> {
        Arc::clone(&self.hooks)
    }

    /// Run the target with this job's arguments. Worker side: emits the
    /// progress line, then lets the target's return value or fault
    /// propagate to the pool's completion reporting.
    pub fn execute(&self) -> TargetResult {
        tracing::info!(job = %self.name, id = %self.id, "Job started");
        self.target.run(&self.args, &self.kwargs)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("result_key", &self.result_key)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .finish_non_exhaustive()
    }
}
