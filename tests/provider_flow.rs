use sagapay::provider::simulator::forced_outcome;
use sagapay::provider::{
    backoff_delay, parse_authorize_payload, retry_step, ProviderOutcome, RetryStep,
};
use std::time::Duration;
use uuid::Uuid;

#[test]
fn backoff_schedule_is_one_two_four_seconds() {
    assert_eq!(backoff_delay(1), Duration::from_secs(1));
    assert_eq!(backoff_delay(2), Duration::from_secs(2));
    assert_eq!(backoff_delay(3), Duration::from_secs(4));
}

#[test]
fn success_emits_immediately() {
    assert_eq!(
        retry_step(ProviderOutcome::Success, 1, 3),
        RetryStep::Emit(ProviderOutcome::Success)
    );
    assert_eq!(
        retry_step(ProviderOutcome::Success, 3, 3),
        RetryStep::Emit(ProviderOutcome::Success)
    );
}

#[test]
fn decline_never_retries() {
    assert_eq!(
        retry_step(ProviderOutcome::Decline, 1, 3),
        RetryStep::Emit(ProviderOutcome::Decline)
    );
}

#[test]
fn timeout_retries_until_the_budget_is_spent() {
    assert_eq!(
        retry_step(ProviderOutcome::Timeout, 1, 3),
        RetryStep::RetryAfter(Duration::from_secs(1))
    );
    assert_eq!(
        retry_step(ProviderOutcome::Timeout, 2, 3),
        RetryStep::RetryAfter(Duration::from_secs(2))
    );
    assert_eq!(retry_step(ProviderOutcome::Timeout, 3, 3), RetryStep::Exhausted);
}

#[test]
fn forced_prefixes_steer_the_simulator() {
    assert_eq!(
        forced_outcome("force-timeout-cust-9"),
        Some(ProviderOutcome::Timeout)
    );
    assert_eq!(
        forced_outcome("FORCE-DECLINE-cust-1"),
        Some(ProviderOutcome::Decline)
    );
    assert_eq!(forced_outcome("cust-1"), None);
}

#[test]
fn well_formed_payload_parses() {
    let payment_id = Uuid::new_v4();
    let payload = serde_json::json!({
        "customer_id": "cust-1",
        "amount_cents": 2_500,
        "currency": "USD",
    });
    let request = parse_authorize_payload(payment_id, &payload).unwrap();
    assert_eq!(request.payment_id, payment_id);
    assert_eq!(request.customer_id, "cust-1");
    assert_eq!(request.amount_cents, 2_500);
    assert_eq!(request.currency, "USD");
}

#[test]
fn zero_amount_is_well_formed() {
    let payload = serde_json::json!({
        "customer_id": "cust-1",
        "amount_cents": 0,
        "currency": "USD",
    });
    assert!(parse_authorize_payload(Uuid::new_v4(), &payload).is_ok());
}

#[test]
fn malformed_payloads_are_rejected() {
    let cases = [
        serde_json::json!({"amount_cents": 100, "currency": "USD"}),
        serde_json::json!({"customer_id": "", "amount_cents": 100, "currency": "USD"}),
        serde_json::json!({"customer_id": "c", "amount_cents": 100, "currency": "US"}),
        serde_json::json!({"customer_id": "c", "amount_cents": -5, "currency": "USD"}),
        serde_json::json!({"customer_id": "c", "amount_cents": "lots", "currency": "USD"}),
    ];
    for payload in cases {
        assert!(
            parse_authorize_payload(Uuid::new_v4(), &payload).is_err(),
            "expected rejection for {payload}"
        );
    }
}
