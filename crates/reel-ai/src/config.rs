//! Provider configuration and chain assembly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::audio::AudioGenerator;
use crate::error::{AiError, AiResult};
use crate::image::ImageGenerator;
use crate::openai::{
    OpenAiChat, OpenAiEndpoint, OpenAiImages, OpenAiSpeech, GROQ_BASE_URL, GROQ_CHAT_MODEL,
    OPENAI_BASE_URL, OPENAI_CHAT_MODEL,
};
use crate::provider::{Capability, FallbackChain, ImageProvider, ScriptProvider, SpeechProvider};
use crate::replicate::{ReplicateClient, ReplicateImages, ReplicateSpeech, REPLICATE_BASE_URL};
use crate::script::ScriptGenerator;

/// Credentials, endpoints and limits for the AI providers.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub replicate_api_token: Option<String>,
    pub openai_base_url: String,
    pub groq_base_url: String,
    pub replicate_base_url: String,
    /// Per provider call
    pub script_timeout: Duration,
    pub image_timeout: Duration,
    pub audio_timeout: Duration,
    /// When false, no speech provider is ever called
    pub narration_enabled: bool,
    /// Image used instead of the built-in 1x1 placeholder
    pub placeholder_image_path: Option<PathBuf>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            groq_api_key: None,
            replicate_api_token: None,
            openai_base_url: OPENAI_BASE_URL.to_string(),
            groq_base_url: GROQ_BASE_URL.to_string(),
            replicate_base_url: REPLICATE_BASE_URL.to_string(),
            script_timeout: Duration::from_secs(60),
            image_timeout: Duration::from_secs(60),
            audio_timeout: Duration::from_secs(60),
            narration_enabled: true,
            placeholder_image_path: None,
        }
    }
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

/// Parse a boolean flag, accepting `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl AiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_secret("OPENAI_API_KEY"),
            groq_api_key: env_secret("GROQ_API_KEY"),
            replicate_api_token: env_secret("REPLICATE_API_TOKEN"),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| OPENAI_BASE_URL.to_string()),
            groq_base_url: std::env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| GROQ_BASE_URL.to_string()),
            replicate_base_url: std::env::var("REPLICATE_BASE_URL")
                .unwrap_or_else(|_| REPLICATE_BASE_URL.to_string()),
            script_timeout: env_secs("SCRIPT_TIMEOUT_SECS", 60),
            image_timeout: env_secs("IMAGE_TIMEOUT_SECS", 60),
            audio_timeout: env_secs("AUDIO_TIMEOUT_SECS", 60),
            narration_enabled: env_flag("NARRATION_ENABLED", true),
            placeholder_image_path: std::env::var("PLACEHOLDER_IMAGE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Build the three generators over one shared HTTP client.
    pub fn build(&self) -> AiResult<Generators> {
        let client = Client::builder()
            .user_agent(concat!("reelforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::config(format!("failed to build HTTP client: {e}")))?;

        let openai = |name: &str| {
            OpenAiEndpoint::openai(
                name,
                self.openai_api_key.clone(),
                self.openai_base_url.clone(),
                client.clone(),
            )
        };
        let replicate = ReplicateClient::new(
            self.replicate_api_token.clone(),
            self.replicate_base_url.clone(),
            client.clone(),
        );

        let script_chain = FallbackChain::<dyn ScriptProvider>::new(Capability::Script)
            .with_provider(Arc::new(OpenAiChat::new(openai("openai-chat"), OPENAI_CHAT_MODEL)))
            .with_provider(Arc::new(OpenAiChat::new(
                OpenAiEndpoint::groq(self.groq_api_key.clone(), self.groq_base_url.clone(), client.clone()),
                GROQ_CHAT_MODEL,
            )))
            .with_timeout(self.script_timeout);

        let image_chain = FallbackChain::<dyn ImageProvider>::new(Capability::Image)
            .with_provider(Arc::new(OpenAiImages::new(openai("openai-images"))))
            .with_provider(Arc::new(ReplicateImages::new(replicate.clone())))
            .with_timeout(self.image_timeout);

        let speech_chain = FallbackChain::<dyn SpeechProvider>::new(Capability::Speech)
            .with_provider(Arc::new(OpenAiSpeech::new(openai("openai-speech"))))
            .with_provider(Arc::new(ReplicateSpeech::new(replicate)))
            .with_timeout(self.audio_timeout);

        Ok(Generators {
            script: ScriptGenerator::new(script_chain),
            image: ImageGenerator::new(image_chain)
                .with_placeholder_path(self.placeholder_image_path.clone()),
            audio: AudioGenerator::new(speech_chain).with_enabled(self.narration_enabled),
        })
    }
}

/// Script, image and audio generators for the pipeline.
#[derive(Clone)]
pub struct Generators {
    pub script: ScriptGenerator,
    pub image: ImageGenerator,
    pub audio: AudioGenerator,
}
