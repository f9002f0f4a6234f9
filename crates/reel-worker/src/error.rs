//! Worker error types.

use thiserror::Error;

use crate::persistence::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Message stored when an error renders to nothing usable.
const GENERIC_FAILURE: &str = "Generation failed";

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("AI generation failed: {0}")]
    Ai(#[from] reel_ai::AiError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Renderer output kept out of `Display`, for logs only.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Media(e) => e.stderr(),
            _ => None,
        }
    }

    /// Message safe to store on a failed job.
    ///
    /// Only the first line is kept, absolute paths are replaced with
    /// `<path>`, and the result is cut to at most `max_len` characters.
    pub fn user_message(&self, max_len: usize) -> String {
        bounded_message(&self.to_string(), max_len)
    }
}

pub(crate) fn bounded_message(raw: &str, max_len: usize) -> String {
    let first_line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");

    let redacted = first_line
        .split(' ')
        .map(|word| if looks_like_path(word) { "<path>" } else { word })
        .collect::<Vec<_>>()
        .join(" ");

    let message = if redacted.is_empty() {
        GENERIC_FAILURE
    } else {
        redacted.as_str()
    };

    message.chars().take(max_len.max(1)).collect()
}

fn looks_like_path(word: &str) -> bool {
    let word = word.trim_matches(|c: char| matches!(c, '\'' | '"' | '(' | ')' | ',' | ':'));
    let unix = word.starts_with('/') && word[1..].contains('/');
    let windows = word.len() > 2 && word.as_bytes()[1] == b':' && word[2..].starts_with('\\');
    unix || windows
}
