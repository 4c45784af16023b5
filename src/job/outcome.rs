//! Tagged job outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal outcome of one job, filed under its result key.
///
/// A fault inside the target is captured here as data; it is never
/// re-raised in the supervisor or the caller. Callers branch on the
/// variant rather than inspecting the value's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The target returned normally.
    Success {
        value: Value,
        completed_at: DateTime<Utc>,
    },
    /// The target faulted (error return or panic).
    Fault {
        message: String,
        completed_at: DateTime<Utc>,
    },
}

impl JobOutcome {
    pub fn success(value: Value) -> Self {
        Self::Success {
            value,
            completed_at: Utc::now(),
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            message: message.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }

    /// The successful value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Fault { .. } => None,
        }
    }

    /// The captured fault message, if any.
    pub fn fault_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Fault { message, .. } => Some(message),
        }
    }

    /// When the supervisor recorded the outcome.
    pub fn completed_at(&self) -> DateTime<Utc> {
        match self {
            Self::Success { completed_at, .. } | Self::Fault { completed_at, .. } => *completed_at,
        }
    }
}
