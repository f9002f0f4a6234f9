//! Prompt-to-video worker binary.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{GenerationRequest, JobStatus};
use reel_worker::metrics::init_metrics;
use reel_worker::{Worker, WorkerConfig};

/// Turn short ideas into vertical videos.
#[derive(Debug, Parser)]
#[command(name = "reel-worker", version, about)]
struct Args {
    /// Ideas to render, one job each
    #[arg(required = true)]
    prompts: Vec<String>,

    /// Single-scene mode
    #[arg(long)]
    fast: bool,

    /// Owner recorded on every job
    #[arg(long, default_value = "local")]
    user: String,

    /// Storage root (overrides STORAGE_PATH)
    #[arg(long)]
    storage_path: Option<PathBuf>,

    /// Public base URL (overrides BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reel=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("Starting reel-worker");

    let mut config = WorkerConfig::from_env();
    if let Some(path) = args.storage_path {
        config = config.with_storage_path(path);
    }
    if let Some(url) = args.base_url {
        config = config.with_base_url(url);
    }

    if let Some(port) = config.metrics_port {
        match init_metrics(port) {
            Ok(()) => info!(port, "Prometheus exporter listening"),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    if config.ffmpeg_path.is_none() {
        if let Err(e) = reel_media::check_ffmpeg() {
            warn!("{}; every job will fail at the render stage", e);
        }
    }

    let worker = match Worker::from_config(&config) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to start worker: {}", e);
            std::process::exit(1);
        }
    };

    let mut submitted = Vec::new();
    for prompt in &args.prompts {
        let request = GenerationRequest::new(prompt.as_str()).with_fast_mode(args.fast);
        match worker.submit(&args.user, request).await {
            Ok(job_id) => submitted.push(job_id),
            Err(e) => error!(prompt = %prompt, "Rejected prompt: {}", e),
        }
    }

    worker.wait_idle().await;

    let mut failures = args.prompts.len() - submitted.len();
    for job_id in &submitted {
        let Some(job) = worker.store().get_job(job_id).await else {
            failures += 1;
            continue;
        };
        match job.status {
            JobStatus::Done => {
                let url = match &job.video_id {
                    Some(video_id) => worker
                        .store()
                        .get_video(video_id)
                        .await
                        .map(|v| v.video.video_url)
                        .unwrap_or_default(),
                    None => String::new(),
                };
                println!("{}\t{}\t{}", job.id, job.status, url);
            }
            _ => {
                failures += 1;
                println!(
                    "{}\t{}\t{}",
                    job.id,
                    job.status,
                    job.error.as_deref().unwrap_or_default()
                );
            }
        }
    }

    info!(jobs = submitted.len(), failures, "Worker finished");
    if failures > 0 {
        std::process::exit(1);
    }
}
