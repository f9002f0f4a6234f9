//! End-to-end job scenarios with stub providers, the in-memory store and
//! local storage in a temp dir. Scenarios that need a finished render are
//! ignored by default; run them with `-- --ignored` where `ffmpeg` and
//! `ffprobe` are on PATH.

use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reel_ai::{
    AudioGenerator, Capability, FallbackChain, Generators, ImageGenerator, ImageProvider,
    Provider, ProviderError, ScriptGenerator, ScriptProvider, SpeechProvider,
};
use reel_media::{probe_video, VideoComposer};
use reel_models::{
    subtitles_path_for, video_path_for, GenerationJob, JobId, JobStatus, VideoId, AUDIO_DIR,
};
use reel_queue::{JobQueue, QueuedJob};
use reel_storage::{LocalStorage, StorageGateway};
use reel_worker::payment::PaymentResult;
use reel_worker::persistence::StoreResult;
use reel_worker::{
    GenerationPipeline, InMemoryJobStore, JobExecutor, JobStore, JobUpdate, NewVideo,
    PaymentGateway, PaymentRecord, Worker, WorkerConfig,
};

fn lavfi(output: &Path, source: &str, extra: &[&str]) -> Vec<u8> {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i", source])
        .args(extra)
        .arg(output)
        .status()
        .unwrap();
    assert!(status.success(), "fixture generation failed for {source}");
    std::fs::read(output).unwrap()
}

// --- stub providers ---------------------------------------------------------

#[derive(Clone)]
enum Stub {
    Bytes(Vec<u8>),
    Quota,
    Broken,
}

struct StubProvider {
    name: &'static str,
    reply: Stub,
    /// Texts that get a hard failure instead of `reply`
    fail_on: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl StubProvider {
    fn new(name: &'static str, reply: Stub) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            fail_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing_on(name: &'static str, reply: Stub, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            fail_on: vec![text.to_string()],
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn respond(&self, input: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        self.calls.lock().unwrap().push(input.to_string());
        if self.fail_on.iter().any(|t| t == input) {
            return Err(ProviderError::other(self.name, "synthesis crashed"));
        }
        match &self.reply {
            Stub::Bytes(bytes) => Ok(Some(bytes.clone())),
            Stub::Quota => Err(ProviderError::quota(self.name, "insufficient_quota")),
            Stub::Broken => Err(ProviderError::other(self.name, "bad gateway")),
        }
    }
}

impl Provider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[async_trait]
impl ScriptProvider for StubProvider {
    async fn complete(&self, _system: &str, user: &str) -> Result<Option<String>, ProviderError> {
        Ok(self
            .respond(user)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}

#[async_trait]
impl ImageProvider for StubProvider {
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        self.respond(prompt)
    }
}

#[async_trait]
impl SpeechProvider for StubProvider {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        self.respond(text)
    }
}

fn generators(images: Vec<Arc<StubProvider>>, speech: Vec<Arc<StubProvider>>) -> Generators {
    let image_chain = images
        .into_iter()
        .fold(FallbackChain::<dyn ImageProvider>::new(Capability::Image), |c, p| {
            c.with_provider(p)
        });
    let speech_chain = speech
        .into_iter()
        .fold(FallbackChain::<dyn SpeechProvider>::new(Capability::Speech), |c, p| {
            c.with_provider(p)
        });
    Generators {
        script: ScriptGenerator::new(FallbackChain::<dyn ScriptProvider>::new(Capability::Script)),
        image: ImageGenerator::new(image_chain),
        audio: AudioGenerator::new(speech_chain),
    }
}

// --- recording collaborators ----------------------------------------------

/// Store that keeps every status transition in order.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryJobStore,
    events: Mutex<Vec<(JobId, JobStatus)>>,
}

impl RecordingStore {
    fn events(&self) -> Vec<(JobId, JobStatus)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn create_job(&self, job: &GenerationJob) -> StoreResult<()> {
        self.inner.create_job(job).await
    }

    async fn update_job_status(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<()> {
        self.events.lock().unwrap().push((job_id.clone(), update.status));
        self.inner.update_job_status(job_id, update).await
    }

    async fn create_video_record(&self, video: NewVideo) -> StoreResult<VideoId> {
        self.inner.create_video_record(video).await
    }

    async fn find_payment_for_job(&self, job_id: &JobId) -> StoreResult<Option<PaymentRecord>> {
        self.inner.find_payment_for_job(job_id).await
    }
}

#[derive(Default)]
struct RecordingPayments {
    refunds: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl PaymentGateway for RecordingPayments {
    async fn issue_refund(&self, owner_id: &str, charge_reference: &str) -> PaymentResult<bool> {
        self.refunds
            .lock()
            .unwrap()
            .push((owner_id.to_string(), charge_reference.to_string()));
        Ok(true)
    }
}

struct Harness {
    queue: JobQueue,
    store: Arc<RecordingStore>,
    storage: Arc<LocalStorage>,
    payments: Arc<RecordingPayments>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(generators: Generators) -> Self {
        Self::with_composer(generators, VideoComposer::new(Duration::from_secs(120)))
    }

    /// A renderer that always exits non-zero, whether or not FFmpeg is
    /// installed.
    #[cfg(unix)]
    fn failing_render(generators: Generators) -> Self {
        Self::with_composer(
            generators,
            VideoComposer::new(Duration::from_secs(10)).with_ffmpeg_binary("false"),
        )
    }

    fn with_composer(generators: Generators, composer: VideoComposer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path(), "http://localhost:3000").unwrap());
        let store = Arc::new(RecordingStore::default());
        let payments = Arc::new(RecordingPayments::default());

        let pipeline = GenerationPipeline::new(
            generators,
            composer,
            storage.clone(),
            store.clone(),
        );
        let executor = JobExecutor::new(pipeline, store.clone(), payments.clone());

        Self {
            queue: JobQueue::new(Arc::new(executor)),
            store,
            storage,
            payments,
            _dir: dir,
        }
    }

    async fn submit(&self, prompt: &str) -> JobId {
        let job = GenerationJob::new("777", prompt);
        self.store.create_job(&job).await.unwrap();
        self.queue
            .enqueue(QueuedJob::new(job.id.clone(), "777", prompt))
            .unwrap();
        job.id
    }

    async fn job(&self, id: &JobId) -> GenerationJob {
        self.store.inner.get_job(id).await.unwrap()
    }
}

// --- scenarios ----------------------------------------------------------------

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn no_providers_renders_mock_script_with_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig::default().with_storage_path(dir.path());
    let worker = Worker::from_config(&config).unwrap();

    let id = worker
        .submit("u1", reel_models::GenerationRequest::new("cats running a bank"))
        .await
        .unwrap();
    worker.wait_idle().await;

    let job = worker.store().get_job(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    assert_eq!(job.progress, 100);
    assert!(job.error.is_none());

    let video = worker
        .store()
        .get_video(job.video_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(
        video.video.video_url,
        format!("http://localhost:3000/static/videos/{id}.mp4")
    );
    assert!(video.video.preview_url.unwrap().contains("/static/scenes/"));
    assert_eq!(video.video.owner_id, "u1");

    let output = worker.storage().absolute_path(&video_path_for(&id));
    let info = probe_video(&output).await.unwrap();
    assert!((info.duration - 7.0).abs() <= 0.1, "duration {}", info.duration);
    assert_eq!((info.width, info.height), (1080, 1920));
    assert!(!info.has_audio);

    let srt = std::fs::read_to_string(worker.storage().absolute_path(&subtitles_path_for(&id))).unwrap();
    assert!(srt.contains("00:00:03,000 --> 00:00:05,000"));
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn image_quota_falls_through_to_second_provider() {
    let fixtures = tempfile::tempdir().unwrap();
    let red = lavfi(
        &fixtures.path().join("red.png"),
        "color=c=red:s=64x64",
        &["-frames:v", "1"],
    );

    let first = StubProvider::new("quota-images", Stub::Quota);
    let second = StubProvider::new("backup-images", Stub::Bytes(red.clone()));
    let harness = Harness::new(generators(vec![first.clone(), second.clone()], vec![]));

    let id = harness.submit("a dog mayor").await;
    harness.queue.wait_idle().await;

    let job = harness.job(&id).await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    assert!(job.error.is_none());
    assert_eq!(first.calls(), 3);
    assert_eq!(second.calls(), 3);

    let scenes = std::fs::read_dir(harness.storage.root().join("scenes")).unwrap();
    for entry in scenes {
        assert_eq!(std::fs::read(entry.unwrap().path()).unwrap(), red);
    }
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn missing_narration_for_last_scene_renders_silent() {
    let fixtures = tempfile::tempdir().unwrap();
    let tone = lavfi(
        &fixtures.path().join("tone.wav"),
        "sine=frequency=440:duration=1",
        &[],
    );

    // The mock script's third line is "The end."
    let speech = StubProvider::failing_on("flaky-speech", Stub::Bytes(tone), "The end.");
    let harness = Harness::new(generators(vec![], vec![speech.clone()]));

    let id = harness.submit("pigeons on strike").await;
    harness.queue.wait_idle().await;

    let job = harness.job(&id).await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    assert_eq!(speech.calls(), 3);

    let info = probe_video(harness.storage.absolute_path(&video_path_for(&id)))
        .await
        .unwrap();
    assert!(!info.has_audio);
    assert!((info.duration - 7.0).abs() <= 0.1, "duration {}", info.duration);
}

#[cfg(unix)]
#[tokio::test]
async fn failed_render_marks_job_failed_and_refunds() {
    let mut wav = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
    wav.resize(44, 0);
    let speech = StubProvider::new("wav-speech", Stub::Bytes(wav));
    let harness = Harness::failing_render(generators(vec![], vec![speech]));

    let job = GenerationJob::new("777", "a haunted toaster");
    harness.store.create_job(&job).await.unwrap();
    harness
        .store
        .inner
        .record_payment(&job.id, PaymentRecord::new("777", "stx-charge-1"))
        .await;
    harness
        .queue
        .enqueue(QueuedJob::new(job.id.clone(), "777", job.prompt.clone()))
        .unwrap();
    harness.queue.wait_idle().await;

    let failed = harness.job(&job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    let message = failed.error.unwrap();
    assert!(message.contains("non-zero status"), "{message}");
    assert!(message.chars().count() <= 500);
    assert!(!message.contains('\n'));
    assert!(!message.contains(harness.storage.root().to_str().unwrap()));

    assert!(failed.video_id.is_none());

    let narration: Vec<_> = std::fs::read_dir(harness.storage.root().join(AUDIO_DIR))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(narration.len(), 3);
    assert!(narration.iter().all(|p| p.extension().is_some_and(|e| e == "wav")));

    assert_eq!(
        harness.payments.refunds.lock().unwrap().clone(),
        vec![("777".to_string(), "stx-charge-1".to_string())]
    );
}

#[tokio::test]
async fn hard_image_failure_fails_job_without_payment() {
    let broken = StubProvider::new("broken-images", Stub::Broken);
    let harness = Harness::new(generators(vec![broken], vec![]));

    let id = harness.submit("a cat astronaut").await;
    harness.queue.wait_idle().await;

    let job = harness.job(&id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("broken-images"));
    assert!(harness.payments.refunds.lock().unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn jobs_run_strictly_one_after_another() {
    let harness = Harness::failing_render(generators(vec![], vec![]));

    let first = harness.submit("first idea").await;
    let second = harness.submit("second idea").await;
    harness.queue.wait_idle().await;

    let events = harness.store.events();
    let first_terminal = events
        .iter()
        .position(|(id, status)| id == &first && status.is_terminal())
        .expect("first job never finished");
    let second_started = events
        .iter()
        .position(|(id, status)| id == &second && *status == JobStatus::Processing)
        .expect("second job never started");
    assert!(second_started > first_terminal, "events: {events:?}");

    assert!(harness.job(&first).await.is_terminal());
    assert!(harness.job(&second).await.is_terminal());
}
