//! Shared data models for the reelforge generation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scripts and scenes
//! - Generation jobs and their lifecycle states
//! - Scene assets and composer input

pub mod asset;
pub mod job;
pub mod scene;

pub use asset::{
    subtitles_path_for, video_path_for, ComposeInput, SceneAsset, AUDIO_DIR, SCENES_DIR,
    VIDEOS_DIR,
};
pub use job::{GenerationJob, GenerationRequest, JobId, JobStatus, VideoId};
pub use scene::{
    fit_to_target, total_duration, validate_script, GenerationMode, Scene, ScriptShapeError,
    DEFAULT_SCENE_SECS, MAX_SCENES, MAX_SCENE_SECS, MIN_SCENE_SECS,
};
