use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Created,
    RiskReview,
    Approved,
    Authorized,
    Captured,
    Settled,
    Failed,
    Reversed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Created => "CREATED",
            PaymentState::RiskReview => "RISK_REVIEW",
            PaymentState::Approved => "APPROVED",
            PaymentState::Authorized => "AUTHORIZED",
            PaymentState::Captured => "CAPTURED",
            PaymentState::Settled => "SETTLED",
            PaymentState::Failed => "FAILED",
            PaymentState::Reversed => "REVERSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(PaymentState::Created),
            "RISK_REVIEW" => Some(PaymentState::RiskReview),
            "APPROVED" => Some(PaymentState::Approved),
            "AUTHORIZED" => Some(PaymentState::Authorized),
            "CAPTURED" => Some(PaymentState::Captured),
            "SETTLED" => Some(PaymentState::Settled),
            "FAILED" => Some(PaymentState::Failed),
            "REVERSED" => Some(PaymentState::Reversed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentCreateRequest {
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub status: PaymentState,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub from_state: Option<PaymentState>,
    pub to_state: PaymentState,
    pub reason: String,
    pub event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetail {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentState,
    pub state_version: i32,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

pub fn validate_create_request(req: &PaymentCreateRequest) -> Result<(), String> {
    if req.customer_id.trim().is_empty() {
        return Err("customer_id must not be empty".to_string());
    }
    if req.amount_cents < 0 {
        return Err("amount_cents must not be negative".to_string());
    }
    if req.currency.len() != 3 || !req.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("currency must be a 3-letter code".to_string());
    }
    if req.idempotency_key.len() < 5 {
        return Err("idempotency_key must be at least 5 characters".to_string());
    }
    Ok(())
}
