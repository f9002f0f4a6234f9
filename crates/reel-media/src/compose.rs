//! Scene composition: still images plus optional narration into one
//! vertical video.
//!
//! Two render paths exist. The silent path loops every image for its
//! scene duration and concatenates the padded frames in a single FFmpeg
//! filter graph. The narrated path renders one fully muxed segment per
//! scene into a scratch directory and joins them with the concat demuxer;
//! any failure there falls back to the silent path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reel_models::ComposeInput;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    concat_list_entry, fit_and_pad, segment_graph, silent_concat_graph, AUDIO_CODEC, FRAME_RATE,
    PIXEL_FORMAT, VIDEO_CODEC,
};

/// Counter bumped whenever the narrated path degrades to silent.
pub const METRIC_AUDIO_FALLBACK: &str = "reel_compose_audio_fallback_total";

/// Prefix of the per-job segment scratch directory.
const SEGMENT_DIR_PREFIX: &str = "_seg_";

/// Default per-invocation render timeout.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Files and timing for one composition, in scene order.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub images: Vec<PathBuf>,
    pub durations: Vec<u32>,
    pub audios: Option<Vec<PathBuf>>,
    pub output: PathBuf,
}

impl CompositionRequest {
    pub fn new(images: Vec<PathBuf>, durations: Vec<u32>, output: impl Into<PathBuf>) -> Self {
        Self {
            images,
            durations,
            audios: None,
            output: output.into(),
        }
    }

    pub fn with_audios(mut self, audios: Option<Vec<PathBuf>>) -> Self {
        self.audios = audios;
        self
    }

    /// Resolve a [`ComposeInput`] of storage-relative assets into files.
    ///
    /// Audio that is not complete for every scene is dropped here, so the
    /// request goes down the silent path as a whole.
    pub fn from_input<F>(input: &ComposeInput, resolve: F, output: impl Into<PathBuf>) -> Self
    where
        F: Fn(&str) -> PathBuf,
    {
        let images = input.scene_images.iter().map(|a| resolve(&a.path)).collect();
        let audios = if input.has_complete_audio() {
            input
                .scene_audios
                .as_ref()
                .map(|audios| audios.iter().map(|a| resolve(&a.path)).collect())
        } else {
            None
        };

        Self::new(images, input.durations(), output).with_audios(audios)
    }

    pub fn total_duration(&self) -> u32 {
        self.durations.iter().sum()
    }

    fn validate(&self) -> MediaResult<()> {
        if self.images.is_empty() {
            return Err(MediaError::invalid_input("at least one scene is required"));
        }
        if self.images.len() != self.durations.len() {
            return Err(MediaError::invalid_input(format!(
                "{} images for {} scene durations",
                self.images.len(),
                self.durations.len()
            )));
        }
        if let Some(index) = self.durations.iter().position(|d| *d == 0) {
            return Err(MediaError::invalid_input(format!(
                "scene {index} has zero duration"
            )));
        }
        if let Some(missing) = self.images.iter().find(|p| !p.is_file()) {
            return Err(MediaError::FileNotFound(missing.clone()));
        }
        Ok(())
    }
}

/// Outcome of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionReport {
    pub scenes: usize,
    pub total_duration_secs: u32,
    /// Output carries narration
    pub narrated: bool,
    /// Narration was available but rendering it failed
    pub audio_fallback: bool,
}

/// Renders scene stills into a 1080x1920, 30 fps H.264 video.
#[derive(Debug, Clone)]
pub struct VideoComposer {
    runner: FfmpegRunner,
}

impl Default for VideoComposer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_TIMEOUT)
    }
}

impl VideoComposer {
    pub fn new(render_timeout: Duration) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(render_timeout),
        }
    }

    /// Render with this FFmpeg binary instead of the one on PATH.
    pub fn with_ffmpeg_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.runner = self.runner.with_binary(binary);
        self
    }

    /// Compose a video at `request.output`.
    pub async fn compose(&self, request: &CompositionRequest) -> MediaResult<CompositionReport> {
        request.validate()?;

        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut report = CompositionReport {
            scenes: request.images.len(),
            total_duration_secs: request.total_duration(),
            narrated: false,
            audio_fallback: false,
        };

        if let Some(audios) = usable_audio(request).await {
            match self.render_narrated(request, &audios).await {
                Ok(()) => {
                    report.narrated = true;
                    info!(
                        scenes = report.scenes,
                        duration_secs = report.total_duration_secs,
                        "Composed narrated video"
                    );
                    return Ok(report);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        stderr = e.stderr().unwrap_or_default(),
                        "Narrated render failed, falling back to silent video"
                    );
                    metrics::counter!(METRIC_AUDIO_FALLBACK).increment(1);
                    report.audio_fallback = true;
                }
            }
        }

        self.render_silent(request).await?;
        info!(
            scenes = report.scenes,
            duration_secs = report.total_duration_secs,
            "Composed silent video"
        );
        Ok(report)
    }

    /// Loop each still for its duration and concatenate them.
    async fn render_silent(&self, request: &CompositionRequest) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::new(&request.output);
        for (image, duration) in request.images.iter().zip(&request.durations) {
            cmd = cmd.looped_image(image, *duration);
        }

        cmd = if request.images.len() == 1 {
            cmd.video_filter(fit_and_pad())
        } else {
            cmd.filter_complex(silent_concat_graph(request.images.len()))
                .map("[outv]")
        };

        let cmd = cmd
            .video_codec(VIDEO_CODEC)
            .frame_rate(FRAME_RATE)
            .pixel_format(PIXEL_FORMAT);

        self.runner.run(&cmd).await
    }

    /// Render one muxed segment per scene, then stream-copy them together.
    async fn render_narrated(
        &self,
        request: &CompositionRequest,
        audios: &[PathBuf],
    ) -> MediaResult<()> {
        let parent = request
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let scratch = tempfile::Builder::new()
            .prefix(SEGMENT_DIR_PREFIX)
            .tempdir_in(parent)?;

        let result = self
            .render_segments_and_concat(request, audios, scratch.path())
            .await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove segment directory");
        }

        result
    }

    async fn render_segments_and_concat(
        &self,
        request: &CompositionRequest,
        audios: &[PathBuf],
        scratch: &Path,
    ) -> MediaResult<()> {
        let mut list = String::new();

        for (index, ((image, audio), duration)) in request
            .images
            .iter()
            .zip(audios)
            .zip(&request.durations)
            .enumerate()
        {
            let segment = scratch.join(format!("seg_{index}.mp4"));
            let cmd = FfmpegCommand::new(&segment)
                .looped_image(image, *duration)
                .input(audio)
                .filter_complex(segment_graph(*duration))
                .map("[v]")
                .map("[a]")
                .video_codec(VIDEO_CODEC)
                .frame_rate(FRAME_RATE)
                .pixel_format(PIXEL_FORMAT)
                .audio_codec(AUDIO_CODEC)
                .output_duration(*duration);

            debug!(segment = index, duration_secs = duration, "Rendering segment");
            self.runner.run(&cmd).await?;

            list.push_str(&concat_list_entry(&segment));
            list.push('\n');
        }

        let list_path = scratch.join("list.txt");
        tokio::fs::write(&list_path, list).await?;

        let cmd = FfmpegCommand::new(&request.output)
            .concat_list(&list_path)
            .codec_copy();
        self.runner.run(&cmd).await
    }
}

/// Audio files to narrate with, when every scene has a real, non-empty one.
async fn usable_audio(request: &CompositionRequest) -> Option<Vec<PathBuf>> {
    let audios = request.audios.as_ref()?;
    if audios.is_empty() || audios.len() != request.images.len() {
        if !audios.is_empty() {
            debug!(
                audios = audios.len(),
                scenes = request.images.len(),
                "Audio count does not match scene count, composing silent"
            );
        }
        return None;
    }

    for audio in audios {
        match tokio::fs::metadata(audio).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            _ => {
                debug!("Narration file missing or empty, composing silent");
                return None;
            }
        }
    }

    Some(audios.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{Scene, SceneAsset};

    fn touch(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_from_input_drops_partial_audio() {
        let scenes = vec![Scene::new("a", 3, "x"), Scene::new("b", 2, "y")];
        let images = vec![SceneAsset::new("scenes/a.png"), SceneAsset::new("scenes/b.png")];
        let input = ComposeInput::new(images, scenes)
            .with_audios(Some(vec![SceneAsset::new("audio/a.mp3")]));

        let req = CompositionRequest::from_input(&input, |p| Path::new("/root").join(p), "/out.mp4");
        assert!(req.audios.is_none());
        assert_eq!(req.durations, vec![3, 2]);
        assert_eq!(req.images[1], PathBuf::from("/root/scenes/b.png"));
        assert_eq!(req.total_duration(), 5);
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let req = CompositionRequest::new(vec![PathBuf::from("a.png")], vec![2, 3], "o.mp4");
        assert!(matches!(req.validate(), Err(MediaError::InvalidInput(_))));

        let empty = CompositionRequest::new(vec![], vec![], "o.mp4");
        assert!(matches!(empty.validate(), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_zero_duration_and_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let img = touch(dir.path(), "a.png", b"png");

        let zero = CompositionRequest::new(vec![img.clone()], vec![0], "o.mp4");
        assert!(matches!(zero.validate(), Err(MediaError::InvalidInput(_))));

        let missing = CompositionRequest::new(vec![dir.path().join("nope.png")], vec![2], "o.mp4");
        assert!(matches!(missing.validate(), Err(MediaError::FileNotFound(_))));

        let ok = CompositionRequest::new(vec![img], vec![2], "o.mp4");
        assert!(ok.validate().is_ok());
    }

    #[tokio::test]
    async fn test_usable_audio_requires_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.mp3", b"ID3");
        let empty = touch(dir.path(), "b.mp3", b"");
        let images = vec![dir.path().join("1.png"), dir.path().join("2.png")];

        let full = CompositionRequest::new(images.clone(), vec![2, 2], "o.mp4")
            .with_audios(Some(vec![a.clone(), a.clone()]));
        assert_eq!(usable_audio(&full).await, Some(vec![a.clone(), a.clone()]));

        let with_empty = CompositionRequest::new(images.clone(), vec![2, 2], "o.mp4")
            .with_audios(Some(vec![a.clone(), empty]));
        assert!(usable_audio(&with_empty).await.is_none());

        let short = CompositionRequest::new(images, vec![2, 2], "o.mp4").with_audios(Some(vec![a]));
        assert!(usable_audio(&short).await.is_none());
    }
}
