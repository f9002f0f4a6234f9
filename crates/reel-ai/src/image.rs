//! Scene image generation with a guaranteed non-empty result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::AiResult;
use crate::provider::{FallbackChain, ImageProvider};

/// Appended to every scene description.
pub const STYLE_SUFFIX: &str = ", vertical aspect ratio 9:16, cinematic lighting, single scene, no text";

/// 1x1 transparent PNG.
pub const PLACEHOLDER_PNG: [u8; 70] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0xDA, 0x63, 0xFC,
    0xCF, 0xC0, 0x50, 0x0F, 0x00, 0x04, 0x85, 0x01, 0x80, 0x84, 0xA9, 0x8C, 0x21, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Produces one still per scene description.
#[derive(Clone)]
pub struct ImageGenerator {
    chain: FallbackChain<dyn ImageProvider>,
    placeholder_path: Option<PathBuf>,
}

impl ImageGenerator {
    pub fn new(chain: FallbackChain<dyn ImageProvider>) -> Self {
        Self {
            chain,
            placeholder_path: None,
        }
    }

    /// Prefer the image at `path` over the built-in placeholder.
    pub fn with_placeholder_path(mut self, path: Option<PathBuf>) -> Self {
        self.placeholder_path = path;
        self
    }

    /// Generate image bytes for a scene's visual description.
    ///
    /// Never returns empty bytes: when every provider is exhausted the
    /// placeholder image is returned instead.
    pub async fn generate(&self, visual: &str) -> AiResult<Vec<u8>> {
        let prompt = format!("{}{}", visual.trim(), STYLE_SUFFIX);

        let image = self
            .chain
            .run(|provider: Arc<dyn ImageProvider>| {
                let prompt = prompt.clone();
                async move { provider.generate_image(&prompt).await }
            })
            .await?;

        match image.filter(|bytes| !bytes.is_empty()) {
            Some(bytes) => {
                debug!(size = bytes.len(), "Scene image generated");
                Ok(bytes)
            }
            None => {
                info!("Using placeholder scene image");
                Ok(self.placeholder().await)
            }
        }
    }

    async fn placeholder(&self) -> Vec<u8> {
        if let Some(path) = &self.placeholder_path {
            if let Some(bytes) = read_non_empty(path).await {
                return bytes;
            }
            warn!(path = %path.display(), "Placeholder image unreadable, using built-in");
        }
        PLACEHOLDER_PNG.to_vec()
    }
}

async fn read_non_empty(path: &Path) -> Option<Vec<u8>> {
    tokio::fs::read(path).await.ok().filter(|b| !b.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AiError, ProviderErrorKind};
    use crate::provider::testing::{Reply, Scripted};
    use crate::provider::Capability;

    fn generator(providers: Vec<Arc<Scripted>>) -> ImageGenerator {
        let chain = providers
            .into_iter()
            .fold(FallbackChain::new(Capability::Image), |chain, p| {
                chain.with_provider(p as Arc<dyn ImageProvider>)
            });
        ImageGenerator::new(chain)
    }

    #[test]
    fn test_placeholder_is_png() {
        assert_eq!(&PLACEHOLDER_PNG[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(&PLACEHOLDER_PNG[PLACEHOLDER_PNG.len() - 8..PLACEHOLDER_PNG.len() - 4], b"IEND");
    }

    #[tokio::test]
    async fn test_no_providers_returns_placeholder() {
        let bytes = generator(vec![]).generate("a cat").await.unwrap();
        assert_eq!(bytes, PLACEHOLDER_PNG.to_vec());
    }

    #[tokio::test]
    async fn test_custom_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("placeholder.png");
        std::fs::write(&custom, b"custom-image").unwrap();

        let gen = generator(vec![]).with_placeholder_path(Some(custom));
        assert_eq!(gen.generate("a cat").await.unwrap(), b"custom-image".to_vec());

        let missing = generator(vec![]).with_placeholder_path(Some(dir.path().join("nope.png")));
        assert_eq!(missing.generate("a cat").await.unwrap(), PLACEHOLDER_PNG.to_vec());
    }

    #[tokio::test]
    async fn test_second_provider_after_quota() {
        let first = Scripted::new("openai-images", Reply::Fail(ProviderErrorKind::QuotaExceeded));
        let second = Scripted::new("replicate-sdxl", Reply::Output(b"sdxl".to_vec()));
        let bytes = generator(vec![first, second]).generate("a cat").await.unwrap();
        assert_eq!(bytes, b"sdxl".to_vec());
    }

    #[tokio::test]
    async fn test_hard_failure_propagates() {
        let first = Scripted::new("openai-images", Reply::Fail(ProviderErrorKind::Other));
        let err = generator(vec![first]).generate("a cat").await.unwrap_err();
        assert!(matches!(err, AiError::Provider(_)));
    }
}
