use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod topics {
    pub const PAYMENTS_REQUESTED: &str = "payments.requested";
    pub const RISK_APPROVED: &str = "risk.approved";
    pub const RISK_DENIED: &str = "risk.denied";
    pub const PROVIDER_AUTHORIZE_REQUESTED: &str = "provider.authorize.requested";
    pub const PAYMENTS_AUTHORIZED: &str = "payments.authorized";
    pub const PAYMENTS_FAILED: &str = "payments.failed";
    pub const PAYMENTS_CAPTURED: &str = "payments.captured";
    pub const PAYMENTS_SETTLED: &str = "payments.settled";
    pub const PAYMENTS_REVERSED: &str = "payments.reversed";
}

pub fn dlq_topic(topic: &str) -> String {
    format!("{topic}.dlq")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub aggregate_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(
        event_type: &str,
        aggregate_id: Uuid,
        correlation_id: &str,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.to_string(),
            aggregate_id,
            event_type: event_type.to_string(),
            payload,
        }
    }
}

/// Build the DLQ envelope for an event that exhausted its retry budget or
/// carried a payload no handler can act on. Replayable entries embed the
/// original envelope so the replay tool can publish it back unchanged and
/// downstream inboxes still deduplicate on the original event_id.
pub fn dead_letter(
    source: &EventEnvelope,
    reason: &str,
    error_type: &str,
    replay_topic: Option<&str>,
) -> EventEnvelope {
    let mut payload = serde_json::json!({
        "reason": reason,
        "error_type": error_type,
        "retryable": replay_topic.is_some(),
        "source_event_id": source.event_id,
    });
    if let Some(topic) = replay_topic {
        payload["replay_topic"] = serde_json::Value::String(topic.to_string());
        payload["failed_event"] = serde_json::to_value(source).unwrap_or_default();
    }
    EventEnvelope::new("payments.dlq", source.aggregate_id, &source.correlation_id, payload)
}

/// Extract the replay target from a DLQ envelope, if it carries one.
pub fn replay_target(dlq_event: &EventEnvelope) -> Option<(String, EventEnvelope)> {
    let topic = dlq_event.payload.get("replay_topic")?.as_str()?.to_string();
    let failed = dlq_event.payload.get("failed_event")?;
    let original: EventEnvelope = serde_json::from_value(failed.clone()).ok()?;
    Some((topic, original))
}
