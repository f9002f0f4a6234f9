//! OpenAI-compatible adapters: chat completions, image generation and
//! speech. Groq exposes the same chat API and reuses [`OpenAiChat`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::{groq_key_valid, openai_key_valid};
use crate::error::ProviderError;
use crate::http::{error_from_response, transport_error};
use crate::provider::{ImageProvider, Provider, ScriptProvider, SpeechProvider};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub const OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";
pub const GROQ_CHAT_MODEL: &str = "llama-3.1-8b-instant";
const CHAT_TEMPERATURE: f64 = 0.8;

const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1792";

const SPEECH_MODEL: &str = "tts-1";
const SPEECH_VOICE: &str = "alloy";

/// Connection details shared by the OpenAI-style adapters.
#[derive(Debug, Clone)]
pub struct OpenAiEndpoint {
    name: String,
    base_url: String,
    api_key: Option<String>,
    key_valid: bool,
    client: Client,
}

impl OpenAiEndpoint {
    fn new(
        name: &str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        key_valid: bool,
        client: Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            key_valid,
            client,
        }
    }

    /// OpenAI endpoint for a named adapter.
    pub fn openai(name: &str, api_key: Option<String>, base_url: impl Into<String>, client: Client) -> Self {
        let valid = openai_key_valid(api_key.as_deref());
        Self::new(name, base_url, api_key, valid, client)
    }

    /// Groq's OpenAI-compatible endpoint.
    pub fn groq(api_key: Option<String>, base_url: impl Into<String>, client: Client) -> Self {
        let valid = groq_key_valid(api_key.as_deref());
        Self::new("groq", base_url, api_key, valid, client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.api_key.as_deref().unwrap_or_default())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(&self.name, response).await);
        }
        Ok(response)
    }

    fn malformed(&self, what: impl std::fmt::Display) -> ProviderError {
        ProviderError::other(&self.name, format!("malformed response: {what}"))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions used for script writing.
pub struct OpenAiChat {
    endpoint: OpenAiEndpoint,
    model: String,
}

impl OpenAiChat {
    pub fn new(endpoint: OpenAiEndpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }
}

impl Provider for OpenAiChat {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn is_configured(&self) -> bool {
        self.endpoint.key_valid
    }
}

#[async_trait]
impl ScriptProvider for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<Option<String>, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: CHAT_TEMPERATURE,
        };

        let response: ChatResponse = self
            .endpoint
            .post("chat/completions", &request)
            .await?
            .json()
            .await
            .map_err(|e| self.endpoint.malformed(e))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(provider = %self.endpoint.name, chars = content.len(), "Script completion received");
        Ok(Some(content))
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

/// DALL-E 3 portrait images.
pub struct OpenAiImages {
    endpoint: OpenAiEndpoint,
}

impl OpenAiImages {
    pub fn new(endpoint: OpenAiEndpoint) -> Self {
        Self { endpoint }
    }
}

impl Provider for OpenAiImages {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn is_configured(&self) -> bool {
        self.endpoint.key_valid
    }
}

#[async_trait]
impl ImageProvider for OpenAiImages {
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let request = ImageRequest {
            model: IMAGE_MODEL,
            prompt,
            n: 1,
            size: IMAGE_SIZE,
            response_format: "b64_json",
        };

        let response: ImageResponse = self
            .endpoint
            .post("images/generations", &request)
            .await?
            .json()
            .await
            .map_err(|e| self.endpoint.malformed(e))?;

        let Some(encoded) = response.data.into_iter().next().and_then(|d| d.b64_json) else {
            return Ok(None);
        };

        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| self.endpoint.malformed(e))?;
        Ok((!bytes.is_empty()).then_some(bytes))
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// Text-to-speech narration.
pub struct OpenAiSpeech {
    endpoint: OpenAiEndpoint,
}

impl OpenAiSpeech {
    pub fn new(endpoint: OpenAiEndpoint) -> Self {
        Self { endpoint }
    }
}

impl Provider for OpenAiSpeech {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn is_configured(&self) -> bool {
        self.endpoint.key_valid
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let request = SpeechRequest {
            model: SPEECH_MODEL,
            voice: SPEECH_VOICE,
            input: text,
            response_format: "mp3",
        };

        let bytes = self
            .endpoint
            .post("audio/speech", &request)
            .await?
            .bytes()
            .await
            .map_err(|e| transport_error(&self.endpoint.name, e))?;

        Ok((!bytes.is_empty()).then(|| bytes.to_vec()))
    }
}
