//! Narration audio. Absence of audio is a normal outcome.

use std::sync::Arc;

use tracing::debug;

use crate::error::AiResult;
use crate::provider::{FallbackChain, SpeechProvider};

/// Longest narration sent to a speech provider, in characters.
pub const MAX_TTS_CHARS: usize = 4000;

/// Produces narration for one scene line.
#[derive(Clone)]
pub struct AudioGenerator {
    chain: FallbackChain<dyn SpeechProvider>,
    enabled: bool,
}

impl AudioGenerator {
    pub fn new(chain: FallbackChain<dyn SpeechProvider>) -> Self {
        Self {
            chain,
            enabled: true,
        }
    }

    /// A generator that never produces audio.
    pub fn disabled() -> Self {
        Self {
            chain: FallbackChain::new(crate::provider::Capability::Speech),
            enabled: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Synthesize `text`, or `None` when no audio is available.
    pub async fn generate(&self, text: &str) -> AiResult<Option<Vec<u8>>> {
        if !self.enabled {
            return Ok(None);
        }
        let line = prepare_text(text);
        if line.is_empty() {
            debug!("Empty narration line, skipping speech");
            return Ok(None);
        }

        let audio = self
            .chain
            .run(|provider: Arc<dyn SpeechProvider>| {
                let line = line.clone();
                async move { provider.synthesize(&line).await }
            })
            .await?;

        Ok(audio.filter(|bytes| !bytes.is_empty()))
    }
}

/// Trim and cut to [`MAX_TTS_CHARS`] on a character boundary.
pub fn prepare_text(text: &str) -> String {
    text.trim().chars().take(MAX_TTS_CHARS).collect()
}
