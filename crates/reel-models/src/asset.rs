//! Scene assets and composition input.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Scene;

/// Storage subdirectory for scene images.
pub const SCENES_DIR: &str = "scenes";

/// Storage subdirectory for narration audio.
pub const AUDIO_DIR: &str = "audio";

/// Storage subdirectory for rendered videos.
pub const VIDEOS_DIR: &str = "videos";

/// A file produced for one scene, addressed by its storage-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneAsset {
    pub path: String,
}

impl SceneAsset {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.path.trim().is_empty()
    }
}

/// Everything the composer needs for one job, in scene order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComposeInput {
    pub scene_images: Vec<SceneAsset>,
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_audios: Option<Vec<SceneAsset>>,
}

impl ComposeInput {
    pub fn new(scene_images: Vec<SceneAsset>, scenes: Vec<Scene>) -> Self {
        Self {
            scene_images,
            scenes,
            scene_audios: None,
        }
    }

    pub fn with_audios(mut self, audios: Option<Vec<SceneAsset>>) -> Self {
        self.scene_audios = audios;
        self
    }

    /// Per-scene durations in seconds.
    pub fn durations(&self) -> Vec<u32> {
        self.scenes.iter().map(|s| s.duration_sec).collect()
    }

    /// Narration is all-or-nothing: one non-empty asset per scene, or none at all.
    pub fn has_complete_audio(&self) -> bool {
        match &self.scene_audios {
            Some(audios) => {
                !audios.is_empty()
                    && audios.len() == self.scenes.len()
                    && audios.iter().all(|a| !a.is_empty())
            }
            None => false,
        }
    }
}

/// Storage-relative path of the rendered video for a job.
pub fn video_path_for(job_id: &crate::JobId) -> String {
    format!("{}/{}.mp4", VIDEOS_DIR, job_id)
}

/// Storage-relative path of the subtitle sidecar for a job.
pub fn subtitles_path_for(job_id: &crate::JobId) -> String {
    format!("{}/{}.srt", VIDEOS_DIR, job_id)
}
