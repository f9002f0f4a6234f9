//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_ai::{env_flag, AiConfig};
use reel_media::DEFAULT_RENDER_TIMEOUT;

use crate::payment::TELEGRAM_API_BASE;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for generated assets
    pub storage_path: PathBuf,
    /// Public base URL the static files are served under
    pub base_url: String,
    /// Longest error message stored on a failed job
    pub error_message_max_len: usize,
    /// Per FFmpeg invocation
    pub render_timeout: Duration,
    /// FFmpeg binary; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Write an SRT sidecar next to each video
    pub write_subtitles: bool,
    /// Bot token for Telegram Stars refunds; refunds are disabled without it
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
    /// Prometheus exporter port
    pub metrics_port: Option<u16>,
    pub ai: AiConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./uploads"),
            base_url: "http://localhost:3000".to_string(),
            error_message_max_len: 500,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            ffmpeg_path: None,
            write_subtitles: true,
            telegram_bot_token: None,
            telegram_api_base: TELEGRAM_API_BASE.to_string(),
            metrics_port: None,
            ai: AiConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            storage_path: std::env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            error_message_max_len: std::env::var("ERROR_MESSAGE_MAX_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|len| *len > 0)
                .unwrap_or(500),
            render_timeout: Duration::from_secs(
                std::env::var("RENDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RENDER_TIMEOUT.as_secs()),
            ),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            write_subtitles: env_flag("WRITE_SUBTITLES", true),
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            telegram_api_base: std::env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| TELEGRAM_API_BASE.to_string()),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            ai: AiConfig::from_env(),
        }
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}
