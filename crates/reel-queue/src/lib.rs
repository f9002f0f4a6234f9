//! In-process job queue.
//!
//! This crate provides:
//! - A FIFO of pending generation jobs
//! - A single worker loop that runs at most one job at a time
//! - Cancellation of jobs that have not started yet

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::QueuedJob;
pub use queue::{JobHandler, JobQueue, METRIC_JOBS_ENQUEUED, METRIC_QUEUE_LENGTH};
