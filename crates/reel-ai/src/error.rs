//! Error types for AI provider calls.

use std::fmt;

use thiserror::Error;

/// Result type for generator operations.
pub type AiResult<T> = Result<T, AiError>;

/// How a provider failure affects the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// Rate limit or exhausted billing quota
    QuotaExceeded,
    /// Missing, revoked or wrong credential
    AuthInvalid,
    /// Anything else, including malformed output and timeouts
    Other,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::AuthInvalid => "auth_invalid",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed call to one provider.
#[derive(Debug, Clone, Error)]
#[error("{provider} failed ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn quota(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::QuotaExceeded, provider, message)
    }

    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::AuthInvalid, provider, message)
    }

    pub fn other(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, provider, message)
    }

    /// Quota and credential failures move on to the next provider.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::QuotaExceeded | ProviderErrorKind::AuthInvalid
        )
    }
}

/// Errors surfaced by the generators.
#[derive(Debug, Error)]
pub enum AiError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AiError {
    pub fn invalid_prompt(msg: impl Into<String>) -> Self {
        Self::InvalidPrompt(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
