//! JobManager — the facade over queue, result store, and supervisor.
//!
//! Construction wires the shared state, clears any stale run flag left by
//! a crashed prior run, spawns the supervisor, and waits (bounded) for it
//! to signal readiness. `shared` routes construction through the
//! process-wide instance registry so one identity means one queue and one
//! pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::{Error, FlagError, LifecycleError, Result, ResultError, SubmissionError};
use crate::flag::FlagStore;
use crate::job::{Job, JobOutcome, ResultKey};
use crate::queue::JobQueue;
use crate::registry;
use crate::store::{MemoryResultStore, ResultStore};
use crate::supervisor::Supervisor;

/// Facade for submitting jobs and retrieving keyed outcomes.
pub struct JobManager {
    name: String,
    flags: FlagStore,
    queue: Arc<JobQueue>,
    store: Arc<dyn ResultStore>,
    readiness_poll: Duration,
    startup_timeout: Duration,
    ready: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("name", &self.name)
            .field("readiness_poll", &self.readiness_poll)
            .field("startup_timeout", &self.startup_timeout)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Start a standalone engine. The caller is responsible for keeping
    /// `config.supervisor_name` unique; for the guarded one-per-identity
    /// path use [`JobManager::shared`].
    pub async fn start(config: EngineConfig) -> Result<Arc<Self>> {
        let manager = Self::launch(config);
        manager.wait_ready().await?;
        Ok(manager)
    }

    /// Get or start the process-wide engine registered under
    /// `config.supervisor_name`. Later calls with the same name return
    /// the same instance; `config` is only consulted on first
    /// construction.
    pub async fn shared(config: EngineConfig) -> Result<Arc<Self>> {
        let name = config.supervisor_name.clone();
        let manager = registry::get_or_create(&name, || Self::launch(config));
        manager.wait_ready().await?;
        Ok(manager)
    }

    /// Wire shared state and spawn the supervisor. Must run inside a
    /// tokio runtime.
    fn launch(config: EngineConfig) -> Arc<Self> {
        let flags = match &config.flag_root {
            Some(root) => FlagStore::with_root(root),
            None => FlagStore::new(),
        };

        // A marker left behind by a crashed prior run would read as
        // "already ready"; clear it before the supervisor starts.
        if flags.is_set(&config.supervisor_name) {
            tracing::warn!(supervisor = %config.supervisor_name, "Clearing stale run flag");
            if let Err(e) = flags.clear(&config.supervisor_name) {
                tracing::warn!(supervisor = %config.supervisor_name, error = %e, "Failed to clear stale flag");
            }
        }

        let (queue, jobs_rx, ack) = JobQueue::channel();
        let store: Arc<dyn ResultStore> = Arc::new(MemoryResultStore::new());

        let supervisor = Supervisor::new(
            config.supervisor_name.clone(),
            flags.clone(),
            config.pool_size,
            ack,
            Arc::clone(&store),
            config.flag_check_interval,
        );
        let handle = tokio::spawn(supervisor.run(jobs_rx));

        Arc::new(Self {
            name: config.supervisor_name,
            flags,
            queue,
            store,
            readiness_poll: config.readiness_poll,
            startup_timeout: config.startup_timeout,
            ready: AtomicBool::new(false),
            supervisor: Mutex::new(Some(handle)),
        })
    }

    /// Wait until the supervisor has raised its flag. Fails with a
    /// startup timeout instead of hanging on an unresponsive launch.
    async fn wait_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        let deadline = Instant::now() + self.startup_timeout;
        while !self.flags.is_set(&self.name) {
            if Instant::now() >= deadline {
                return Err(LifecycleError::StartupTimeout {
                    name: self.name.clone(),
                    timeout: self.startup_timeout,
                }
                .into());
            }
            tokio::time::sleep(self.readiness_poll).await;
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Enqueue a job for execution; returns its result key. Never blocks
    /// on execution.
    pub fn submit(&self, job: Job) -> Result<ResultKey> {
        if job.result_key().is_empty() {
            return Err(SubmissionError::EmptyResultKey.into());
        }
        let key = job.result_key().clone();
        self.queue.put(job)?;
        Ok(key)
    }

    /// Suspend until every submitted job has been executed and its
    /// outcome published. No timeout; callers that need one can wrap
    /// this in `tokio::time::timeout`.
    pub async fn wait(&self) {
        self.queue.join().await;
    }

    /// Remove and return the outcome stored under `key`. One-shot: a
    /// second call for the same key fails with NotFound, as does a key
    /// that was never submitted or has not completed yet.
    pub async fn take_result(&self, key: impl Into<ResultKey>) -> Result<JobOutcome> {
        let key = key.into();
        self.store.take(&key).await.ok_or_else(|| {
            Error::from(ResultError::NotFound {
                key: key.to_string(),
            })
        })
    }

    /// Number of submitted-but-unacknowledged jobs.
    pub fn outstanding(&self) -> usize {
        self.queue.outstanding()
    }

    /// Request shutdown and wait for the loop to exit. In-flight jobs
    /// finish naturally and publish their outcomes first; jobs still
    /// queued but never dispatched are dropped.
    pub async fn shutdown(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        registry::remove(&self.name);

        match self.flags.clear(&self.name) {
            Ok(()) => {}
            Err(FlagError::NotFound { .. }) => {
                return Err(LifecycleError::NotRunning {
                    name: self.name.clone(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        let handle = self.supervisor.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(supervisor = %self.name, error = %e, "Supervisor task ended abnormally");
            }
        }
        Ok(())
    }
}
