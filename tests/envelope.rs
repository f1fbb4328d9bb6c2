use sagapay::domain::envelope::{
    dead_letter, dlq_topic, replay_target, topics, EventEnvelope,
};
use uuid::Uuid;

#[test]
fn envelope_serializes_with_the_wire_field_names() {
    let envelope = EventEnvelope::new(
        topics::PAYMENTS_REQUESTED,
        Uuid::new_v4(),
        "corr-1",
        serde_json::json!({"amount_cents": 2_500}),
    );
    let value = serde_json::to_value(&envelope).unwrap();

    assert!(value.get("event_id").is_some());
    assert!(value.get("occurred_at").is_some());
    assert_eq!(value["correlation_id"], "corr-1");
    assert!(value.get("aggregate_id").is_some());
    assert_eq!(value["type"], "payments.requested");
    assert_eq!(value["payload"]["amount_cents"], 2_500);
    // The struct field name must not leak onto the wire.
    assert!(value.get("event_type").is_none());
}

#[test]
fn envelope_round_trips() {
    let envelope = EventEnvelope::new(
        topics::RISK_APPROVED,
        Uuid::new_v4(),
        "corr-2",
        serde_json::json!({"decision": "APPROVE"}),
    );
    let json = serde_json::to_string(&envelope).unwrap();
    let back: EventEnvelope = serde_json::from_str(&json).unwrap();
    assert_eq!(back.event_id, envelope.event_id);
    assert_eq!(back.aggregate_id, envelope.aggregate_id);
    assert_eq!(back.event_type, envelope.event_type);
}

#[test]
fn dlq_topics_are_derived_per_topic() {
    assert_eq!(
        dlq_topic(topics::PROVIDER_AUTHORIZE_REQUESTED),
        "provider.authorize.requested.dlq"
    );
    assert_eq!(dlq_topic(topics::PAYMENTS_FAILED), "payments.failed.dlq");
}

#[test]
fn replayable_dead_letters_carry_the_original_envelope() {
    let original = EventEnvelope::new(
        topics::PROVIDER_AUTHORIZE_REQUESTED,
        Uuid::new_v4(),
        "corr-3",
        serde_json::json!({"customer_id": "cust-1", "amount_cents": 100, "currency": "USD"}),
    );
    let dlq = dead_letter(
        &original,
        "PROVIDER_TIMEOUT",
        "RETRY_EXHAUSTED",
        Some(topics::PROVIDER_AUTHORIZE_REQUESTED),
    );

    assert_eq!(dlq.aggregate_id, original.aggregate_id);
    assert_eq!(dlq.correlation_id, original.correlation_id);
    assert_eq!(dlq.payload["error_type"], "RETRY_EXHAUSTED");
    assert_eq!(dlq.payload["retryable"], true);

    let (topic, replayed) = replay_target(&dlq).unwrap();
    assert_eq!(topic, topics::PROVIDER_AUTHORIZE_REQUESTED);
    assert_eq!(replayed.event_id, original.event_id);
    assert_eq!(replayed.payload, original.payload);
}

#[test]
fn non_replayable_dead_letters_have_no_target() {
    let original = EventEnvelope::new(
        topics::PROVIDER_AUTHORIZE_REQUESTED,
        Uuid::new_v4(),
        "corr-4",
        serde_json::json!({"customer_id": ""}),
    );
    let dlq = dead_letter(&original, "invalid customer_id", "NON_RETRYABLE", None);
    assert_eq!(dlq.payload["retryable"], false);
    assert!(replay_target(&dlq).is_none());
}
