//! Classification of provider HTTP failures.

use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::error::{ProviderError, ProviderErrorKind};

/// Longest slice of a provider error body kept in messages.
const MAX_BODY_CHARS: usize = 300;

/// Map a status code and error body onto a [`ProviderErrorKind`].
pub fn classify(status: StatusCode, body: &str) -> ProviderErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderErrorKind::QuotaExceeded;
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderErrorKind::AuthInvalid;
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let code = error
        .and_then(|e| e.get("code").or_else(|| e.get("type")))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match code {
        "insufficient_quota" | "rate_limit_exceeded" => ProviderErrorKind::QuotaExceeded,
        "invalid_api_key" => ProviderErrorKind::AuthInvalid,
        _ => {
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .or_else(|| parsed.as_ref().and_then(|v| v.get("detail")).and_then(Value::as_str))
                .unwrap_or_default()
                .to_ascii_lowercase();
            if message.contains("quota") || message.contains("billing") {
                ProviderErrorKind::QuotaExceeded
            } else if message.contains("incorrect api key") || message.contains("invalid api key") {
                ProviderErrorKind::AuthInvalid
            } else {
                ProviderErrorKind::Other
            }
        }
    }
}

/// Turn a non-success response into a classified [`ProviderError`].
pub async fn error_from_response(provider: &str, response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let kind = classify(status, &body);
    let snippet: String = body.chars().take(MAX_BODY_CHARS).collect();
    ProviderError::new(kind, provider, format!("HTTP {status}: {snippet}"))
}

/// Transport failures are never quota or auth problems.
pub fn transport_error(provider: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::other(provider, format!("request failed: {err}"))
}
