use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub mod simulator;

#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderOutcome {
    Success,
    Decline,
    Timeout,
}

impl ProviderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOutcome::Success => "SUCCESS",
            ProviderOutcome::Decline => "DECLINE",
            ProviderOutcome::Timeout => "TIMEOUT",
        }
    }
}

#[async_trait::async_trait]
pub trait CardProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authorize(&self, request: &AuthorizeRequest) -> ProviderOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    Emit(ProviderOutcome),
    RetryAfter(Duration),
    Exhausted,
}

/// Backoff schedule for transient provider timeouts: 1s, 2s, 4s.
pub fn backoff_delay(attempt: i32) -> Duration {
    Duration::from_secs(1_u64 << (attempt - 1).clamp(0, 8) as u32)
}

/// Retry is in-consumer and only for the clearly-transient class; declines
/// and successes are final on the spot.
pub fn retry_step(outcome: ProviderOutcome, attempt: i32, max_attempts: i32) -> RetryStep {
    match outcome {
        ProviderOutcome::Success => RetryStep::Emit(ProviderOutcome::Success),
        ProviderOutcome::Decline => RetryStep::Emit(ProviderOutcome::Decline),
        ProviderOutcome::Timeout if attempt < max_attempts => {
            RetryStep::RetryAfter(backoff_delay(attempt))
        }
        ProviderOutcome::Timeout => RetryStep::Exhausted,
    }
}

/// Schema check on the authorize payload. Failures are MALFORMED: not
/// retryable, dead-lettered immediately.
pub fn parse_authorize_payload(
    payment_id: Uuid,
    payload: &serde_json::Value,
) -> Result<AuthorizeRequest, String> {
    let customer_id = payload
        .get("customer_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or("invalid customer_id")?;
    let currency = payload
        .get("currency")
        .and_then(|v| v.as_str())
        .filter(|s| s.len() == 3)
        .ok_or("invalid currency")?;
    let amount_cents = payload
        .get("amount_cents")
        .and_then(|v| v.as_i64())
        .filter(|n| *n >= 0)
        .ok_or("invalid amount_cents")?;

    Ok(AuthorizeRequest {
        payment_id,
        customer_id: customer_id.to_string(),
        amount_cents,
        currency: currency.to_string(),
    })
}
