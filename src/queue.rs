//! Shared work queue — multi-producer, single-consumer, with an
//! outstanding count.
//!
//! Submission never blocks. The outstanding count tracks every job from
//! `put` until the supervisor acknowledges it through its [`AckHandle`];
//! `join` suspends the caller until the count reaches zero. The producer
//! handle and the acknowledgement handle are distinct so that the
//! supervisor holding one does not keep the producer side alive.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::SubmissionError;
use crate::job::Job;

/// State shared between producers and the acknowledging consumer.
struct QueueState {
    outstanding: AtomicUsize,
    drained: Notify,
}

impl QueueState {
    fn task_done(&self) {
        let prev = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "task_done without a matching put");
        if prev == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Producer half of the work queue, shared by every submitter.
pub struct JobQueue {
    tx: UnboundedSender<Job>,
    state: Arc<QueueState>,
}

/// Consumer-side handle for acknowledging processed jobs. Held by the
/// supervisor; deliberately does not keep the producer channel open.
pub struct AckHandle {
    state: Arc<QueueState>,
}

impl AckHandle {
    /// Acknowledge one dequeued job as fully processed.
    pub fn task_done(&self) {
        self.state.task_done();
    }
}

impl JobQueue {
    /// Create the queue: the shared producer handle, the one consumer
    /// end, and the acknowledgement handle for whoever drains it.
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<Job>, AckHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(QueueState {
            outstanding: AtomicUsize::new(0),
            drained: Notify::new(),
        });
        let queue = Arc::new(Self {
            tx,
            state: Arc::clone(&state),
        });
        (queue, rx, AckHandle { state })
    }

    /// Enqueue a job and count it as outstanding. Fails only when the
    /// consumer side is gone.
    pub fn put(&self, job: Job) -> Result<(), SubmissionError> {
        let name = job.name().to_string();
        // Counted before the send: the supervisor may dequeue, run, and
        // acknowledge the job before this thread takes another step.
        self.state.outstanding.fetch_add(1, Ordering::SeqCst);
        match self.tx.send(job) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.state.task_done();
                Err(SubmissionError::EngineStopped { name })
            }
        }
    }

    /// Suspend until every submitted job has been acknowledged. Returns
    /// immediately when nothing is outstanding.
    pub async fn join(&self) {
        loop {
            let drained = self.state.drained.notified();
            if self.state.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            drained.await;
        }
    }

    /// Number of submitted-but-unacknowledged jobs.
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }
}
