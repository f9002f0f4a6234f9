//! Replicate prediction adapters: SDXL images and Bark narration.
//!
//! A prediction is created with `Prefer: wait` and polled through its
//! `urls.get` link until it settles; the first output URL is then
//! downloaded. A failed download counts as no output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::credentials::replicate_token_valid;
use crate::error::ProviderError;
use crate::http::{error_from_response, transport_error};
use crate::provider::{ImageProvider, Provider, SpeechProvider};

pub const REPLICATE_BASE_URL: &str = "https://api.replicate.com";

/// stability-ai/sdxl
pub const SDXL_VERSION: &str = "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b";

pub const BARK_MODEL: &str = "ttsds/bark";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What to run on Replicate.
#[derive(Debug, Clone)]
pub enum ReplicateTarget {
    /// Pinned model version
    Version(String),
    /// Latest deployment of `owner/name`
    Model(String),
}

#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Minimal Replicate HTTP client.
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(token: Option<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_configured(&self) -> bool {
        replicate_token_valid(self.token.as_deref())
    }

    fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }

    /// Run a prediction and download its first output file.
    async fn run(
        &self,
        provider: &str,
        target: &ReplicateTarget,
        input: Value,
    ) -> Result<Option<Vec<u8>>, ProviderError> {
        let (url, body) = match target {
            ReplicateTarget::Version(version) => (
                format!("{}/v1/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            ReplicateTarget::Model(model) => (
                format!("{}/v1/models/{}/predictions", self.base_url, model),
                json!({ "input": input }),
            ),
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(self.token())
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(provider, e))?;
        if !response.status().is_success() {
            return Err(error_from_response(provider, response).await);
        }

        let mut prediction: Prediction = response
            .json()
            .await
            .map_err(|e| ProviderError::other(provider, format!("malformed prediction: {e}")))?;

        while !is_settled(&prediction.status) {
            let Some(poll_url) = prediction.urls.as_ref().and_then(|u| u.get.clone()) else {
                return Err(ProviderError::other(provider, "prediction has no polling URL"));
            };
            tokio::time::sleep(self.poll_interval).await;
            debug!(provider, status = %prediction.status, "Polling prediction");

            let response = self
                .client
                .get(poll_url)
                .bearer_auth(self.token())
                .send()
                .await
                .map_err(|e| transport_error(provider, e))?;
            if !response.status().is_success() {
                return Err(error_from_response(provider, response).await);
            }
            prediction = response
                .json()
                .await
                .map_err(|e| ProviderError::other(provider, format!("malformed prediction: {e}")))?;
        }

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                .unwrap_or_else(|| prediction.status.clone());
            return Err(ProviderError::other(provider, format!("prediction {reason}")));
        }

        let Some(output_url) = prediction.output.as_ref().and_then(first_output_url) else {
            return Ok(None);
        };

        let download = self
            .client
            .get(output_url)
            .send()
            .await
            .map_err(|e| transport_error(provider, e))?;
        if !download.status().is_success() {
            debug!(provider, status = %download.status(), "Output download failed");
            return Ok(None);
        }

        let bytes = download
            .bytes()
            .await
            .map_err(|e| transport_error(provider, e))?;
        Ok((!bytes.is_empty()).then(|| bytes.to_vec()))
    }
}

fn is_settled(status: &str) -> bool {
    matches!(status, "succeeded" | "failed" | "canceled")
}

/// Output is either a URL or a list of URLs; some models wrap it in an
/// object with an `audio_out` field.
fn first_output_url(output: &Value) -> Option<&str> {
    match output {
        Value::String(url) => Some(url.as_str()),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        Value::Object(map) => map.get("audio_out").and_then(Value::as_str),
        _ => None,
    }
}

/// SDXL still images.
pub struct ReplicateImages {
    client: ReplicateClient,
    target: ReplicateTarget,
}

impl ReplicateImages {
    pub fn new(client: ReplicateClient) -> Self {
        Self {
            client,
            target: ReplicateTarget::Version(SDXL_VERSION.to_string()),
        }
    }
}

impl Provider for ReplicateImages {
    fn name(&self) -> &str {
        "replicate-sdxl"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }
}

#[async_trait]
impl ImageProvider for ReplicateImages {
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        self.client
            .run(self.name(), &self.target, json!({ "prompt": prompt }))
            .await
    }
}

/// Bark narration.
pub struct ReplicateSpeech {
    client: ReplicateClient,
    target: ReplicateTarget,
}

impl ReplicateSpeech {
    pub fn new(client: ReplicateClient) -> Self {
        Self {
            client,
            target: ReplicateTarget::Model(BARK_MODEL.to_string()),
        }
    }
}

impl Provider for ReplicateSpeech {
    fn name(&self) -> &str {
        "replicate-bark"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }
}

#[async_trait]
impl SpeechProvider for ReplicateSpeech {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        self.client
            .run(self.name(), &self.target, json!({ "text": text }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "r8_live_0123456789abcdefghij";

    fn client(server: &MockServer) -> ReplicateClient {
        ReplicateClient::new(Some(TOKEN.to_string()), server.uri(), Client::new())
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_image_prediction_downloads_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .and(header("prefer", "wait"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "succeeded",
                "output": [format!("{}/files/out.png", server.uri())],
                "urls": {"get": format!("{}/v1/predictions/p1", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/out.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;

        let images = ReplicateImages::new(client(&server));
        assert_eq!(images.generate_image("a cat").await.unwrap(), Some(b"png".to_vec()));
    }

    #[tokio::test]
    async fn test_speech_polls_until_settled() {
        let server = MockServer::start().await;
        let poll = format!("{}/v1/predictions/p2", server.uri());
        Mock::given(method("POST"))
            .and(path("/v1/models/ttsds/bark/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "processing",
                "urls": {"get": poll}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "succeeded",
                "output": {"audio_out": format!("{}/files/a.wav", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/a.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF".to_vec()))
            .mount(&server)
            .await;

        let speech = ReplicateSpeech::new(client(&server));
        assert_eq!(speech.synthesize("hello").await.unwrap(), Some(b"RIFF".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_download_is_no_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "succeeded",
                "output": format!("{}/files/gone.png", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let images = ReplicateImages::new(client(&server));
        assert_eq!(images.generate_image("a cat").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_prediction_is_hard_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "failed",
                "error": "NSFW content detected"
            })))
            .mount(&server)
            .await;

        let images = ReplicateImages::new(client(&server));
        let err = images.generate_image("a cat").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Other);
        assert!(err.message.contains("NSFW"));
    }

    #[tokio::test]
    async fn test_payment_required_is_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "detail": "You have insufficient credit. Set up billing to continue."
            })))
            .mount(&server)
            .await;

        let images = ReplicateImages::new(client(&server));
        let err = images.generate_image("a cat").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_first_output_url() {
        assert_eq!(first_output_url(&json!("u")), Some("u"));
        assert_eq!(first_output_url(&json!(["a", "b"])), Some("a"));
        assert_eq!(first_output_url(&json!(null)), None);
    }
}
