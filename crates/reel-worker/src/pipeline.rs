//! Prompt-to-video pipeline.
//!
//! Stages, with the progress reported after each:
//! 1. script generation (20)
//! 2. per-scene image and narration, generated concurrently (55)
//! 3. composition input assembled (75)
//! 4. render, optional subtitles, video record
//!
//! Completion (100) and failure are persisted by the executor.

use std::sync::Arc;

use futures::future::join_all;
use reel_ai::Generators;
use reel_media::{
    audio_extension, generate_srt, probe_video, CompositionReport, CompositionRequest,
    VideoComposer,
};
use reel_models::{
    subtitles_path_for, video_path_for, ComposeInput, JobId, Scene, SceneAsset, VideoId,
    AUDIO_DIR, SCENES_DIR,
};
use reel_queue::QueuedJob;
use reel_storage::StorageGateway;

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::persistence::{JobStore, JobUpdate, NewVideo};

pub const PROGRESS_STARTED: u8 = 5;
pub const PROGRESS_SCRIPT: u8 = 20;
pub const PROGRESS_ASSETS: u8 = 55;
pub const PROGRESS_RENDER: u8 = 75;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub video_id: VideoId,
    /// Storage-relative path of the video
    pub video_path: String,
    pub video_url: String,
    pub scenes: Vec<Scene>,
    pub report: CompositionReport,
}

/// Assets generated for one scene.
struct SceneAssets {
    image: SceneAsset,
    audio: Option<SceneAsset>,
}

/// Runs one job from prompt to stored video.
#[derive(Clone)]
pub struct GenerationPipeline {
    generators: Generators,
    composer: VideoComposer,
    storage: Arc<dyn StorageGateway>,
    store: Arc<dyn JobStore>,
    write_subtitles: bool,
}

impl GenerationPipeline {
    pub fn new(
        generators: Generators,
        composer: VideoComposer,
        storage: Arc<dyn StorageGateway>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            generators,
            composer,
            storage,
            store,
            write_subtitles: true,
        }
    }

    pub fn with_subtitles(mut self, enabled: bool) -> Self {
        self.write_subtitles = enabled;
        self
    }

    pub async fn run(&self, job: &QueuedJob, logger: &JobLogger) -> WorkerResult<PipelineOutput> {
        let mode = job.mode();

        let scenes = self.generators.script.generate(&job.prompt, mode).await?;
        self.report_progress(&job.job_id, PROGRESS_SCRIPT, logger).await;
        logger.log_progress(
            PROGRESS_SCRIPT,
            &format!("script ready: {} scenes ({})", scenes.len(), mode),
        );

        // One future per scene; join_all keeps scene order.
        let assets = join_all(
            scenes
                .iter()
                .enumerate()
                .map(|(index, scene)| self.scene_assets(index, scene, logger)),
        )
        .await
        .into_iter()
        .collect::<WorkerResult<Vec<_>>>()?;
        self.report_progress(&job.job_id, PROGRESS_ASSETS, logger).await;

        let (images, audios): (Vec<_>, Vec<_>) =
            assets.into_iter().map(|a| (a.image, a.audio)).unzip();
        let audios: Vec<SceneAsset> = audios.into_iter().flatten().collect();
        let narrated_scenes = audios.len();
        logger.log_progress(
            PROGRESS_ASSETS,
            &format!("assets ready: {} images, {} narrations", images.len(), narrated_scenes),
        );

        let preview = images.first().map(|image| self.storage.public_url(&image.path));
        let input = ComposeInput::new(images, scenes.clone())
            .with_audios((!audios.is_empty()).then_some(audios));
        if narrated_scenes > 0 && !input.has_complete_audio() {
            logger.log_warning("narration missing for some scenes, rendering silent video");
        }

        let video_path = video_path_for(&job.job_id);
        let request = CompositionRequest::from_input(
            &input,
            |relative| self.storage.absolute_path(relative),
            self.storage.absolute_path(&video_path),
        );
        self.report_progress(&job.job_id, PROGRESS_RENDER, logger).await;
        logger.log_progress(PROGRESS_RENDER, "rendering video");

        let report = self.composer.compose(&request).await?;
        if report.audio_fallback {
            logger.log_warning("narrated render failed, video is silent");
        }

        match probe_video(&request.output).await {
            Ok(info) => logger.log_progress(
                PROGRESS_RENDER,
                &format!(
                    "rendered {:.2}s {}x{} audio={}",
                    info.duration, info.width, info.height, info.has_audio
                ),
            ),
            Err(e) => logger.log_warning(&format!("could not probe rendered video: {e}")),
        }

        if self.write_subtitles {
            let srt = generate_srt(&scenes);
            if let Err(e) = self
                .storage
                .save_at(&subtitles_path_for(&job.job_id), srt.as_bytes())
                .await
            {
                logger.log_warning(&format!("subtitles not written: {e}"));
            }
        }

        let video_url = self.storage.public_url(&video_path);
        let video_id = self
            .store
            .create_video_record(NewVideo {
                prompt: job.prompt.clone(),
                video_url: video_url.clone(),
                preview_url: preview,
                owner_id: job.user_id.clone(),
            })
            .await?;

        Ok(PipelineOutput {
            video_id,
            video_path,
            video_url,
            scenes,
            report,
        })
    }

    /// Image and narration for one scene.
    ///
    /// Image failures fail the job. Narration failures only drop that
    /// scene's audio, which makes the whole video silent.
    async fn scene_assets(
        &self,
        index: usize,
        scene: &Scene,
        logger: &JobLogger,
    ) -> WorkerResult<SceneAssets> {
        let (image, audio) = tokio::join!(
            self.generators.image.generate(&scene.visual),
            self.generators.audio.generate(&scene.text),
        );

        let image_path = self.storage.save_bytes(&image?, SCENES_DIR, ".png").await?;

        let audio = match audio {
            Ok(Some(bytes)) => {
                let extension = audio_extension(&bytes);
                match self.storage.save_bytes(&bytes, AUDIO_DIR, extension).await {
                    Ok(path) => Some(SceneAsset::new(path)),
                    Err(e) => {
                        logger.log_warning(&format!("scene {}: narration not saved: {e}", index + 1));
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(e) => {
                logger.log_warning(&format!("scene {}: narration failed: {e}", index + 1));
                None
            }
        };

        Ok(SceneAssets {
            image: SceneAsset::new(image_path),
            audio,
        })
    }

    /// Persist advisory progress; failures are only logged.
    pub(crate) async fn report_progress(&self, job_id: &JobId, progress: u8, logger: &JobLogger) {
        if let Err(e) = self
            .store
            .update_job_status(job_id, JobUpdate::processing(progress))
            .await
        {
            logger.log_warning(&format!("progress {progress} not persisted: {e}"));
        }
    }
}
