//! Worker-pool supervisor — the long-lived loop that drains the queue.
//!
//! The supervisor raises its own run flag on entry (launchers poll it to
//! confirm readiness) and keeps looping while the flag stays set. Each
//! dequeued job is dispatched onto a bounded pool of blocking worker
//! slots; workers report back over a completion channel, so the loop
//! never blocks on an individual job. Clearing the flag asks the loop to
//! stop: it quits draining, lets resident workers finish naturally, and
//! still publishes their outcomes before tearing down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinError;

use crate::flag::FlagStore;
use crate::job::{Job, JobHooks, JobOutcome, ResultKey};
use crate::queue::AckHandle;
use crate::store::ResultStore;

/// A completed dispatch, reported back from a worker slot.
struct Completion {
    key: ResultKey,
    outcome: JobOutcome,
}

/// Supervisor-side record of a dispatched, not-yet-completed job.
struct PendingDispatch {
    job_name: String,
    hooks: Arc<dyn JobHooks>,
}

/// Owns the worker pool and the consumer end of the work queue.
pub struct Supervisor {
    name: String,
    flags: FlagStore,
    pool: Arc<Semaphore>,
    pool_size: usize,
    ack: AckHandle,
    store: Arc<dyn ResultStore>,
    flag_check_interval: Duration,
}

impl Supervisor {
    pub fn new(
        name: impl Into<String>,
        flags: FlagStore,
        pool_size: usize,
        ack: AckHandle,
        store: Arc<dyn ResultStore>,
        flag_check_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            flags,
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            ack,
            store,
            flag_check_interval,
        }
    }

    /// Run until the flag is cleared or every producer is gone.
    pub async fn run(self, mut jobs: UnboundedReceiver<Job>) {
        if let Err(e) = self.flags.set(&self.name) {
            tracing::error!(supervisor = %self.name, error = %e, "Failed to raise run flag; not starting");
            return;
        }
        tracing::info!(supervisor = %self.name, pool_size = self.pool_size, "Supervisor started");

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut pending: HashMap<ResultKey, PendingDispatch> = HashMap::new();

        let mut flag_check = tokio::time::interval(self.flag_check_interval);
        flag_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_job = jobs.recv() => match maybe_job {
                    Some(job) => self.dispatch(job, &done_tx, &mut pending),
                    None => {
                        tracing::info!(supervisor = %self.name, "All producers gone; stopping");
                        break;
                    }
                },
                Some(done) = done_rx.recv() => {
                    self.complete(done, &mut pending).await;
                }
                _ = flag_check.tick() => {
                    if !self.flags.is_set(&self.name) {
                        tracing::info!(supervisor = %self.name, "Run flag cleared; stopping");
                        break;
                    }
                }
            }
        }

        // Resident workers finish naturally; their outcomes still get
        // published and acknowledged. `done_tx` is alive in this scope, so
        // recv cannot return None while dispatches remain.
        while !pending.is_empty() {
            match done_rx.recv().await {
                Some(done) => self.complete(done, &mut pending).await,
                None => break,
            }
        }

        // Stopped without an external clear (producers vanished): lower
        // the flag so the next launch does not read a stale marker.
        if self.flags.is_set(&self.name) {
            if let Err(e) = self.flags.clear(&self.name) {
                tracing::warn!(supervisor = %self.name, error = %e, "Failed to lower run flag");
            }
        }
        tracing::info!(supervisor = %self.name, "Supervisor stopped");
    }

    /// Hand a job to the pool without waiting for a slot: a task per job
    /// acquires a slot, runs the body on a blocking thread, and reports
    /// the outcome over the completion channel.
    fn dispatch(
        &self,
        job: Job,
        done_tx: &UnboundedSender<Completion>,
        pending: &mut HashMap<ResultKey, PendingDispatch>,
    ) {
        let key = job.result_key().clone();
        tracing::debug!(
            supervisor = %self.name,
            job = %job.name(),
            id = %job.id(),
            key = %key,
            "Dispatching job"
        );

        let record = PendingDispatch {
            job_name: job.name().to_string(),
            hooks: job.hooks(),
        };
        if pending.insert(key.clone(), record).is_some() {
            tracing::warn!(key = %key, "Result key reused while in flight; earlier outcome will be lost");
        }

        let pool = Arc::clone(&self.pool);
        let done = done_tx.clone();
        tokio::spawn(async move {
            let _permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // pool closed, engine tearing down
            };
            let outcome = match tokio::task::spawn_blocking(move || job.execute()).await {
                Ok(Ok(value)) => JobOutcome::success(value),
                Ok(Err(fault)) => JobOutcome::fault(fault.to_string()),
                Err(join_err) => JobOutcome::fault(panic_message(join_err)),
            };
            let _ = done.send(Completion { key, outcome });
        });
    }

    /// Record one completion: fire the job's hook, file the outcome, and
    /// acknowledge the queue entry, in that order, so that `wait()`
    /// returning implies the outcome is retrievable.
    async fn complete(&self, done: Completion, pending: &mut HashMap<ResultKey, PendingDispatch>) {
        let Completion { key, outcome } = done;

        match pending.remove(&key) {
            Some(dispatch) => match &outcome {
                JobOutcome::Success { value, .. } => {
                    dispatch.hooks.on_success(&dispatch.job_name, value)
                }
                JobOutcome::Fault { message, .. } => {
                    dispatch.hooks.on_error(&dispatch.job_name, message)
                }
            },
            None => tracing::warn!(key = %key, "Completion for an unknown dispatch"),
        }

        self.store.insert(key, outcome).await;
        self.ack.task_done();
    }
}

/// Render a worker `JoinError` as a captured fault message.
fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(panic) => {
            if let Some(s) = panic.downcast_ref::<&str>() {
                format!("Job panicked: {s}")
            } else if let Some(s) = panic.downcast_ref::<String>() {
                format!("Job panicked: {s}")
            } else {
                "Job panicked".to_string()
            }
        }
        Err(e) => format!("Worker task failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    use crate::job::TargetResult;
    use crate::queue::JobQueue;
    use crate::store::MemoryResultStore;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn square(args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
        let x = args[0].as_i64().unwrap_or(0);
        Ok(json!(x * x))
    }

    fn boom(_args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
        Err("boom".into())
    }

    fn panicky(_args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
        panic!("kaboom");
    }

    struct Rig {
        _dir: TempDir,
        flags: FlagStore,
        queue: Arc<JobQueue>,
        store: Arc<MemoryResultStore>,
        handle: tokio::task::JoinHandle<()>,
    }

    async fn start(name: &str) -> Rig {
        let dir = TempDir::new().unwrap();
        let flags = FlagStore::with_root(dir.path());
        let (queue, rx, ack) = JobQueue::channel();
        let store = Arc::new(MemoryResultStore::new());

        let supervisor = Supervisor::new(
            name,
            flags.clone(),
            2,
            ack,
            Arc::clone(&store) as Arc<dyn ResultStore>,
            Duration::from_millis(50),
        );
        let handle = tokio::spawn(supervisor.run(rx));

        // Readiness: the supervisor raises its own flag on entry.
        timeout(TEST_TIMEOUT, async {
            while !flags.is_set(name) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("supervisor should signal readiness");

        Rig {
            _dir: dir,
            flags,
            queue,
            store,
            handle,
        }
    }

    #[tokio::test]
    async fn executes_jobs_and_publishes_outcomes() {
        let rig = start("sup-exec").await;

        for i in 0..5 {
            let job = Job::new(
                format!("square {i}"),
                format!("{i}"),
                Arc::new(square),
                vec![json!(i)],
                Map::new(),
            );
            rig.queue.put(job).unwrap();
        }

        timeout(TEST_TIMEOUT, rig.queue.join()).await.unwrap();

        for i in 0..5i64 {
            let outcome = rig
                .store
                .take(&ResultKey::from(format!("{i}")))
                .await
                .unwrap();
            assert_eq!(outcome.value(), Some(&json!(i * i)));
        }
    }

    #[tokio::test]
    async fn captures_faults_as_outcomes() {
        let rig = start("sup-fault").await;

        rig.queue
            .put(Job::new("boom", "bad", Arc::new(boom), vec![], Map::new()))
            .unwrap();
        rig.queue
            .put(Job::new(
                "fine",
                "good",
                Arc::new(square),
                vec![json!(3)],
                Map::new(),
            ))
            .unwrap();

        timeout(TEST_TIMEOUT, rig.queue.join()).await.unwrap();

        let bad = rig.store.take(&ResultKey::from("bad")).await.unwrap();
        assert_eq!(bad.fault_message(), Some("boom"));

        // The fault did not disturb the other job.
        let good = rig.store.take(&ResultKey::from("good")).await.unwrap();
        assert_eq!(good.value(), Some(&json!(9)));
    }

    #[tokio::test]
    async fn captures_worker_panics() {
        let rig = start("sup-panic").await;

        rig.queue
            .put(Job::new("panicky", "p", Arc::new(panicky), vec![], Map::new()))
            .unwrap();

        timeout(TEST_TIMEOUT, rig.queue.join()).await.unwrap();

        let outcome = rig.store.take(&ResultKey::from("p")).await.unwrap();
        assert!(outcome.is_fault());
        assert!(outcome.fault_message().unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn clearing_the_flag_stops_the_loop() {
        let rig = start("sup-stop").await;

        rig.flags.clear("sup-stop").unwrap();
        timeout(TEST_TIMEOUT, rig.handle)
            .await
            .expect("supervisor should notice the cleared flag")
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_all_producers_stops_the_loop_and_lowers_the_flag() {
        let rig = start("sup-orphan").await;

        let Rig {
            _dir,
            flags,
            queue,
            handle,
            ..
        } = rig;
        drop(queue);

        timeout(TEST_TIMEOUT, handle)
            .await
            .expect("supervisor should stop when producers vanish")
            .unwrap();
        assert!(!flags.is_set("sup-orphan"));
    }
}
