//! Shared result store.
//!
//! Single writer (the supervisor), many readers (callers). Retrieval is
//! one-shot: `take` removes the entry. The store is an injected
//! dependency of both supervisor and manager, so tests can observe it
//! directly.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::job::{JobOutcome, ResultKey};

/// Keyed outcome storage shared between supervisor and callers.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// File an outcome under its key. Exactly one insert happens per
    /// submitted job.
    async fn insert(&self, key: ResultKey, outcome: JobOutcome);

    /// Remove and return the outcome under `key`, if present.
    async fn take(&self, key: &ResultKey) -> Option<JobOutcome>;

    /// Number of outcomes currently held.
    async fn len(&self) -> usize;
}

/// In-memory store for the single-runtime engine.
pub struct MemoryResultStore {
    entries: RwLock<HashMap<ResultKey, JobOutcome>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn insert(&self, key: ResultKey, outcome: JobOutcome) {
        if self.entries.write().await.insert(key.clone(), outcome).is_some() {
            // Key reuse across in-flight jobs is a caller bug; last write wins.
            tracing::warn!(key = %key, "Overwrote an unretrieved outcome");
        }
    }

    async fn take(&self, key: &ResultKey) -> Option<JobOutcome> {
        self.entries.write().await.remove(key)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
