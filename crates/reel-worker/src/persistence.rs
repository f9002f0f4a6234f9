//! Job persistence gateway.
//!
//! The pipeline only talks to [`JobStore`]. [`InMemoryJobStore`] backs the
//! standalone binary and the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reel_models::{GenerationJob, JobId, JobStatus, VideoId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Store backend failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Partial update of a job's lifecycle fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub video_id: Option<VideoId>,
}

impl JobUpdate {
    pub fn processing(progress: u8) -> Self {
        Self {
            status: JobStatus::Processing,
            progress: Some(progress),
            error: None,
            video_id: None,
        }
    }

    pub fn done(video_id: VideoId) -> Self {
        Self {
            status: JobStatus::Done,
            progress: Some(100),
            error: None,
            video_id: Some(video_id),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            error: Some(error.into()),
            video_id: None,
        }
    }
}

/// Finished video to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub prompt: String,
    pub video_url: String,
    pub preview_url: Option<String>,
    pub owner_id: String,
}

/// Stored video record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: VideoId,
    #[serde(flatten)]
    pub video: NewVideo,
    pub created_at: DateTime<Utc>,
}

/// Payment that paid for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub owner_id: String,
    /// Platform charge ID used to refund the payment
    pub charge_reference: String,
}

impl PaymentRecord {
    pub fn new(owner_id: impl Into<String>, charge_reference: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            charge_reference: charge_reference.into(),
        }
    }
}

/// Persistence the worker reads and writes.
///
/// Callers log failures from these methods; none of them is fatal to the
/// queue.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &GenerationJob) -> StoreResult<()>;

    async fn update_job_status(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<()>;

    async fn create_video_record(&self, video: NewVideo) -> StoreResult<VideoId>;

    async fn find_payment_for_job(&self, job_id: &JobId) -> StoreResult<Option<PaymentRecord>>;
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
    videos: RwLock<HashMap<VideoId, VideoRecord>>,
    payments: RwLock<HashMap<JobId, PaymentRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_job(&self, job_id: &JobId) -> Option<GenerationJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn get_video(&self, video_id: &VideoId) -> Option<VideoRecord> {
        self.videos.read().await.get(video_id).cloned()
    }

    /// Attach a payment to a job, replacing any previous one.
    pub async fn record_payment(&self, job_id: &JobId, payment: PaymentRecord) {
        self.payments.write().await.insert(job_id.clone(), payment);
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &GenerationJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, "Job created");
        Ok(())
    }

    async fn update_job_status(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::not_found(job_id.as_str()))?;

        match (update.status, update.video_id) {
            (JobStatus::Done, Some(video_id)) => job.complete(video_id),
            (JobStatus::Failed, _) => job.fail(update.error.unwrap_or_default()),
            (status, video_id) => {
                job.set_status(status);
                if video_id.is_some() {
                    job.video_id = video_id;
                }
                if let Some(error) = update.error {
                    job.error = Some(error);
                }
            }
        }
        if let Some(progress) = update.progress {
            job.advance_progress(progress);
        }

        debug!(job_id = %job_id, status = %job.status, progress = job.progress, "Job updated");
        Ok(())
    }

    async fn create_video_record(&self, video: NewVideo) -> StoreResult<VideoId> {
        let id = VideoId::new();
        let record = VideoRecord {
            id: id.clone(),
            video,
            created_at: Utc::now(),
        };
        self.videos.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn find_payment_for_job(&self, job_id: &JobId) -> StoreResult<Option<PaymentRecord>> {
        Ok(self.payments.read().await.get(job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_updates() {
        let store = InMemoryJobStore::new();
        let job = GenerationJob::new("user-1", "cats as kings");
        store.create_job(&job).await.unwrap();

        store.update_job_status(&job.id, JobUpdate::processing(20)).await.unwrap();
        store.update_job_status(&job.id, JobUpdate::processing(5)).await.unwrap();
        let current = store.get_job(&job.id).await.unwrap();
        assert_eq!(current.status, JobStatus::Processing);
        assert_eq!(current.progress, 20);

        let video_id = store
            .create_video_record(NewVideo {
                prompt: job.prompt.clone(),
                video_url: "http://localhost:3000/static/videos/x.mp4".into(),
                preview_url: None,
                owner_id: job.user_id.clone(),
            })
            .await
            .unwrap();
        store.update_job_status(&job.id, JobUpdate::done(video_id.clone())).await.unwrap();

        let done = store.get_job(&job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.progress, 100);
        assert_eq!(done.video_id, Some(video_id.clone()));
        assert_eq!(store.get_video(&video_id).await.unwrap().video.owner_id, "user-1");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_message() {
        let store = InMemoryJobStore::new();
        let job = GenerationJob::new("user-1", "cats");
        store.create_job(&job).await.unwrap();

        store.update_job_status(&job.id, JobUpdate::failed("render failed")).await.unwrap();
        let failed = store.get_job(&job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("render failed"));
    }

    #[tokio::test]
    async fn test_unknown_job_and_duplicates() {
        let store = InMemoryJobStore::new();
        let missing = store
            .update_job_status(&JobId::new(), JobUpdate::processing(5))
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));

        let job = GenerationJob::new("u", "p");
        store.create_job(&job).await.unwrap();
        assert!(matches!(
            store.create_job(&job).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_lookup() {
        let store = InMemoryJobStore::new();
        let id = JobId::new();
        assert!(store.find_payment_for_job(&id).await.unwrap().is_none());

        store.record_payment(&id, PaymentRecord::new("42", "charge-1")).await;
        let payment = store.find_payment_for_job(&id).await.unwrap().unwrap();
        assert_eq!(payment.charge_reference, "charge-1");
    }
}
