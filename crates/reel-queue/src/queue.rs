//! Sequential job queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reel_models::JobId;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueuedJob;

pub const METRIC_JOBS_ENQUEUED: &str = "reel_jobs_enqueued_total";
pub const METRIC_QUEUE_LENGTH: &str = "reel_queue_length";

/// Runs one job to a terminal state.
///
/// Implementations own all failure handling; the queue only observes
/// panics, which it logs before moving on.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: QueuedJob);
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedJob>,
    running: Option<JobId>,
    /// A run loop task exists
    active: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    handler: Arc<dyn JobHandler>,
    busy: watch::Sender<bool>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO queue drained by a single worker loop.
///
/// Enqueueing never waits for a job to run. While jobs are pending a
/// loop task pops them one at a time; it exits once the queue is empty
/// and the next enqueue starts a new one.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                handler,
                busy,
            }),
        }
    }

    /// Append a job and start the worker loop if it is idle.
    ///
    /// Returns the number of jobs ahead of this one, counting a running job.
    pub fn enqueue(&self, job: QueuedJob) -> QueueResult<usize> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| QueueError::enqueue_failed(format!("no async runtime: {e}")))?;

        let mut state = self.inner.lock();
        let duplicate = state.running.as_ref() == Some(&job.job_id)
            || state.pending.iter().any(|p| p.job_id == job.job_id);
        if duplicate {
            return Err(QueueError::duplicate(job.job_id.as_str()));
        }

        let ahead = state.pending.len() + usize::from(state.running.is_some());
        info!(job_id = %job.job_id, user_id = %job.user_id, ahead, "Job enqueued");
        state.pending.push_back(job);

        metrics::counter!(METRIC_JOBS_ENQUEUED).increment(1);
        metrics::gauge!(METRIC_QUEUE_LENGTH).set(state.pending.len() as f64);

        if !state.active {
            state.active = true;
            self.inner.busy.send_replace(true);
            runtime.spawn(run_loop(Arc::clone(&self.inner)));
        }

        Ok(ahead)
    }

    /// Remove a job that has not started yet.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let mut state = self.inner.lock();
        let before = state.pending.len();
        state.pending.retain(|job| &job.job_id != job_id);
        let removed = state.pending.len() != before;
        if removed {
            info!(job_id = %job_id, "Queued job cancelled");
            metrics::gauge!(METRIC_QUEUE_LENGTH).set(state.pending.len() as f64);
        }
        removed
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn running_job(&self) -> Option<JobId> {
        self.inner.lock().running.clone()
    }

    /// A job is running or waiting.
    pub fn is_busy(&self) -> bool {
        self.inner.lock().active
    }

    /// Wait until no job is running and none is pending.
    pub async fn wait_idle(&self) {
        let mut busy = self.inner.busy.subscribe();
        // The sender lives as long as `self`, so this only ends on idle.
        let _ = busy.wait_for(|busy| !*busy).await;
    }
}

async fn run_loop(inner: Arc<Inner>) {
    debug!("Queue worker started");

    loop {
        let job = {
            let mut state = inner.lock();
            match state.pending.pop_front() {
                Some(job) => {
                    state.running = Some(job.job_id.clone());
                    metrics::gauge!(METRIC_QUEUE_LENGTH).set(state.pending.len() as f64);
                    job
                }
                None => {
                    state.running = None;
                    state.active = false;
                    inner.busy.send_replace(false);
                    debug!("Queue drained, worker stopping");
                    return;
                }
            }
        };

        let job_id = job.job_id.clone();
        let handler = Arc::clone(&inner.handler);

        // Running in its own task turns a panic into a JoinError.
        match tokio::spawn(async move { handler.handle(job).await }).await {
            Ok(()) => debug!(job_id = %job_id, "Job finished"),
            Err(e) if e.is_panic() => error!(job_id = %job_id, "Job panicked, moving on"),
            Err(e) => warn!(job_id = %job_id, error = %e, "Job task aborted"),
        }

        inner.lock().running = None;
    }
}
