//! Queue payloads.

use chrono::{DateTime, Utc};
use reel_models::{GenerationMode, JobId};
use serde::{Deserialize, Serialize};

/// One prompt-to-video request waiting for the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Job ID, already persisted by the caller
    pub job_id: JobId,
    /// Owner of the job
    pub user_id: String,
    /// Idea to turn into a clip
    pub prompt: String,
    /// Single-scene mode
    #[serde(default)]
    pub fast: bool,
    /// When the job was enqueued
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn new(job_id: JobId, user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            job_id,
            user_id: user_id.into(),
            prompt: prompt.into(),
            fast: false,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_fast_mode(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn mode(&self) -> GenerationMode {
        GenerationMode::from_fast_flag(self.fast)
    }
}
