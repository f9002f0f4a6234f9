//! FFmpeg CLI wrapper that renders scene stills into vertical videos.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with a bounded runner
//! - Filter graphs for the 1080x1920 scene layout
//! - Silent and narrated scene composition
//! - FFprobe inspection and SRT subtitle timing

pub mod command;
pub mod compose;
pub mod error;
pub mod filters;
pub mod probe;
pub mod subtitles;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{
    CompositionReport, CompositionRequest, VideoComposer, DEFAULT_RENDER_TIMEOUT,
    METRIC_AUDIO_FALLBACK,
};
pub use error::{MediaError, MediaResult};
pub use filters::{FRAME_RATE, OUTPUT_HEIGHT, OUTPUT_WIDTH};
pub use probe::{audio_extension, probe_video, VideoInfo};
pub use subtitles::{format_timestamp, generate_srt};
