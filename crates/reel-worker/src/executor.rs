//! Job executor.
//!
//! Drives one queued job to `done` or `failed`. Nothing here returns an
//! error to the queue: persistence and refund failures are logged and the
//! queue moves on to the next job.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info, Instrument};

use reel_queue::{JobHandler, QueuedJob};

use crate::error::WorkerError;
use crate::logging::{JobLogger, GENERATE_VIDEO};
use crate::metrics::{record_job_completed, record_job_failed, record_refund, RefundOutcome};
use crate::payment::PaymentGateway;
use crate::persistence::{JobStore, JobUpdate};
use crate::pipeline::{GenerationPipeline, PROGRESS_STARTED};

/// Longest error message stored on a job unless configured otherwise.
pub const DEFAULT_ERROR_MESSAGE_MAX_LEN: usize = 500;

/// Queue handler running the generation pipeline.
pub struct JobExecutor {
    pipeline: GenerationPipeline,
    store: Arc<dyn JobStore>,
    payments: Arc<dyn PaymentGateway>,
    error_message_max_len: usize,
}

impl JobExecutor {
    pub fn new(
        pipeline: GenerationPipeline,
        store: Arc<dyn JobStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            pipeline,
            store,
            payments,
            error_message_max_len: DEFAULT_ERROR_MESSAGE_MAX_LEN,
        }
    }

    pub fn with_error_message_max_len(mut self, max_len: usize) -> Self {
        self.error_message_max_len = max_len.max(1);
        self
    }

    /// Execute a single job to a terminal state.
    pub async fn execute(&self, job: QueuedJob) {
        let logger = JobLogger::new(&job.job_id, GENERATE_VIDEO);
        let span = logger.create_span();
        self.execute_inner(job, logger).instrument(span).await
    }

    async fn execute_inner(&self, job: QueuedJob, logger: JobLogger) {
        let started = Instant::now();
        let mode = job.mode();
        logger.log_start(&format!("{} mode for user {}", mode, job.user_id));

        self.pipeline
            .report_progress(&job.job_id, PROGRESS_STARTED, &logger)
            .await;

        match self.pipeline.run(&job, &logger).await {
            Ok(output) => {
                if let Err(e) = self
                    .store
                    .update_job_status(&job.job_id, JobUpdate::done(output.video_id.clone()))
                    .await
                {
                    logger.log_error(&format!("failed to persist completion: {e}"));
                }
                record_job_completed(mode.as_str(), started.elapsed().as_secs_f64());
                logger.log_completion(&format!(
                    "video {} at {} ({} scenes, {}s, narrated={})",
                    output.video_id,
                    output.video_url,
                    output.report.scenes,
                    output.report.total_duration_secs,
                    output.report.narrated
                ));
            }
            Err(e) => {
                record_job_failed(mode.as_str());
                self.fail(&job, &e, &logger).await;
            }
        }
    }

    async fn fail(&self, job: &QueuedJob, err: &WorkerError, logger: &JobLogger) {
        logger.log_error(&err.to_string());
        if let Some(stderr) = err.stderr() {
            error!(job_id = %job.job_id, stderr, "Renderer output");
        }

        let message = err.user_message(self.error_message_max_len);
        if let Err(e) = self
            .store
            .update_job_status(&job.job_id, JobUpdate::failed(message))
            .await
        {
            logger.log_error(&format!("failed to persist failure: {e}"));
        }

        self.refund(job, logger).await;
    }

    /// Best-effort refund of the payment behind a failed job.
    async fn refund(&self, job: &QueuedJob, logger: &JobLogger) {
        let payment = match self.store.find_payment_for_job(&job.job_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                debug!(job_id = %job.job_id, "No payment for failed job, nothing to refund");
                return;
            }
            Err(e) => {
                logger.log_warning(&format!("payment lookup failed, refund skipped: {e}"));
                return;
            }
        };

        let outcome = match self
            .payments
            .issue_refund(&payment.owner_id, &payment.charge_reference)
            .await
        {
            Ok(true) => {
                info!(job_id = %job.job_id, owner_id = %payment.owner_id, "Payment refunded");
                RefundOutcome::Refunded
            }
            Ok(false) => {
                logger.log_warning("refund declined by payment platform");
                RefundOutcome::Declined
            }
            Err(e) => {
                logger.log_warning(&format!("refund failed: {e}"));
                RefundOutcome::Error
            }
        };
        record_refund(outcome);
    }
}

#[async_trait]
impl JobHandler for JobExecutor {
    async fn handle(&self, job: QueuedJob) {
        self.execute(job).await
    }
}
