//! Standalone worker: in-memory store, local storage and one job queue.

use std::sync::Arc;

use reel_media::VideoComposer;
use reel_models::{GenerationJob, GenerationRequest, JobId};
use reel_queue::{JobQueue, QueuedJob};
use reel_storage::LocalStorage;
use tracing::info;
use validator::Validate;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::JobExecutor;
use crate::payment::{DisabledPayments, PaymentGateway, TelegramStarsGateway};
use crate::persistence::{InMemoryJobStore, JobStore};
use crate::pipeline::GenerationPipeline;

/// Everything needed to accept prompts and run them to completion.
pub struct Worker {
    queue: JobQueue,
    store: Arc<InMemoryJobStore>,
    storage: Arc<LocalStorage>,
}

impl Worker {
    /// Wire providers, storage, payments and the queue from `config`.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let generators = config.ai.build()?;
        let storage = Arc::new(LocalStorage::new(&config.storage_path, config.base_url.clone())?);
        let store = Arc::new(InMemoryJobStore::new());

        let payments: Arc<dyn PaymentGateway> = match &config.telegram_bot_token {
            Some(token) => {
                let client = reqwest::Client::builder()
                    .user_agent(concat!("reelforge/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .map_err(|e| WorkerError::config_error(format!("payment client: {e}")))?;
                Arc::new(TelegramStarsGateway::new(
                    client,
                    config.telegram_api_base.clone(),
                    token.clone(),
                ))
            }
            None => Arc::new(DisabledPayments),
        };

        let mut composer = VideoComposer::new(config.render_timeout);
        if let Some(ffmpeg) = &config.ffmpeg_path {
            composer = composer.with_ffmpeg_binary(ffmpeg);
        }

        let pipeline = GenerationPipeline::new(
            generators,
            composer,
            storage.clone(),
            store.clone(),
        )
        .with_subtitles(config.write_subtitles);
        let executor = JobExecutor::new(pipeline, store.clone(), payments)
            .with_error_message_max_len(config.error_message_max_len);

        info!(
            storage_root = %storage.root().display(),
            base_url = %storage.base_url(),
            refunds = config.telegram_bot_token.is_some(),
            "Worker ready"
        );

        Ok(Self {
            queue: JobQueue::new(Arc::new(executor)),
            store,
            storage,
        })
    }

    /// Validate a request, persist it as a queued job and enqueue it.
    pub async fn submit(&self, user_id: &str, request: GenerationRequest) -> WorkerResult<JobId> {
        request
            .validate()
            .map_err(|e| WorkerError::invalid_request(e.to_string()))?;
        if request.prompt.trim().is_empty() {
            return Err(WorkerError::invalid_request("prompt is blank"));
        }

        let job = GenerationJob::new(user_id, request.prompt.trim());
        self.store.create_job(&job).await?;

        let queued = QueuedJob::new(job.id.clone(), user_id, job.prompt.clone())
            .with_fast_mode(request.fast);
        let ahead = self.queue.enqueue(queued)?;
        info!(job_id = %job.id, ahead, mode = %request.mode(), "Job submitted");

        Ok(job.id)
    }

    /// Wait until every submitted job reached a terminal state.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn store(&self) -> &InMemoryJobStore {
        &self.store
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_rejects_bad_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let worker =
            Worker::from_config(&WorkerConfig::default().with_storage_path(dir.path())).unwrap();

        let empty = worker.submit("u", GenerationRequest::new("")).await;
        assert!(matches!(empty, Err(WorkerError::InvalidRequest(_))));

        let blank = worker.submit("u", GenerationRequest::new("   ")).await;
        assert!(matches!(blank, Err(WorkerError::InvalidRequest(_))));

        let long = worker.submit("u", GenerationRequest::new("x".repeat(501))).await;
        assert!(matches!(long, Err(WorkerError::InvalidRequest(_))));

        assert!(!worker.queue().is_busy());
    }
}
