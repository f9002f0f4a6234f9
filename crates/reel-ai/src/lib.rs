//! AI provider orchestration for scripts, scene images and narration.
//!
//! Each capability has a ranked [`FallbackChain`] of provider adapters.
//! Quota and credential failures move on to the next provider; when the
//! chain is exhausted the generators return a deterministic fallback
//! (mock script, placeholder image, no audio).

pub mod audio;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod image;
pub mod openai;
pub mod provider;
pub mod replicate;
pub mod script;

pub use audio::{AudioGenerator, MAX_TTS_CHARS};
pub use config::{env_flag, AiConfig, Generators};
pub use error::{AiError, AiResult, ProviderError, ProviderErrorKind};
pub use image::{ImageGenerator, PLACEHOLDER_PNG, STYLE_SUFFIX};
pub use provider::{
    Capability, FallbackChain, ImageProvider, Provider, ScriptProvider, SpeechProvider,
    METRIC_PROVIDER_FALLBACKS,
};
pub use script::{mock_scenes, parse_script, ScriptGenerator};
