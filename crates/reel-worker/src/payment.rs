//! Payment gateway used for compensating refunds.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid payment owner: {0}")]
    InvalidOwner(String),

    #[error("Payment request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid payment response: {0}")]
    InvalidResponse(String),
}

/// Issues refunds for paid jobs.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refund a charge. `Ok(false)` means the platform declined it.
    async fn issue_refund(&self, owner_id: &str, charge_reference: &str) -> PaymentResult<bool>;
}

/// Used when no payment platform is configured; every refund is declined.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPayments;

#[async_trait]
impl PaymentGateway for DisabledPayments {
    async fn issue_refund(&self, owner_id: &str, _charge_reference: &str) -> PaymentResult<bool> {
        warn!(owner_id, "Refund requested but payments are not configured");
        Ok(false)
    }
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<bool>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Stars refunds through the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramStarsGateway {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramStarsGateway {
    pub fn new(client: Client, api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for TelegramStarsGateway {
    async fn issue_refund(&self, owner_id: &str, charge_reference: &str) -> PaymentResult<bool> {
        let user_id: i64 = owner_id
            .trim()
            .parse()
            .map_err(|_| PaymentError::InvalidOwner(owner_id.to_string()))?;

        let url = format!("{}/bot{}/refundStarPayment", self.api_base, self.bot_token);
        let response = self
            .client
            .post(url)
            .json(&json!({
                "user_id": user_id,
                "telegram_payment_charge_id": charge_reference,
            }))
            .send()
            .await
            // reqwest errors carry the URL, which contains the bot token.
            .map_err(|e| PaymentError::RequestFailed(e.without_url().to_string()))?;

        let status = response.status();
        let body: BotApiResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("HTTP {status}: {}", e.without_url())))?;

        if body.ok {
            info!(user_id, "Stars payment refunded");
            Ok(body.result.unwrap_or(true))
        } else {
            warn!(
                user_id,
                status = %status,
                description = body.description.as_deref().unwrap_or("none"),
                "Telegram declined refund"
            );
            Ok(false)
        }
    }
}
