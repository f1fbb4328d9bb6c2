use axum::http::StatusCode;
use sagapay::cache::refill_tokens;
use sagapay::domain::payment::{validate_create_request, PaymentCreateRequest};
use sagapay::error::SagaError;
use sagapay::repo::outbox_repo::attempts_exhausted;

fn request() -> PaymentCreateRequest {
    PaymentCreateRequest {
        customer_id: "cust-1".to_string(),
        amount_cents: 2_500,
        currency: "USD".to_string(),
        idempotency_key: "idem-001".to_string(),
    }
}

#[test]
fn the_happy_request_validates() {
    assert!(validate_create_request(&request()).is_ok());
}

#[test]
fn zero_amount_is_accepted_at_the_boundary() {
    let mut req = request();
    req.amount_cents = 0;
    assert!(validate_create_request(&req).is_ok());
}

#[test]
fn negative_amounts_are_rejected() {
    let mut req = request();
    req.amount_cents = -1;
    assert!(validate_create_request(&req).is_err());
}

#[test]
fn currency_must_be_three_ascii_letters() {
    for bad in ["US", "USDC", "U1D", ""] {
        let mut req = request();
        req.currency = bad.to_string();
        assert!(validate_create_request(&req).is_err(), "accepted {bad:?}");
    }
    let mut req = request();
    req.currency = "eur".to_string();
    assert!(validate_create_request(&req).is_ok());
}

#[test]
fn short_idempotency_keys_are_rejected() {
    let mut req = request();
    req.idempotency_key = "abc".to_string();
    assert!(validate_create_request(&req).is_err());
}

#[test]
fn blank_customers_are_rejected() {
    let mut req = request();
    req.customer_id = "   ".to_string();
    assert!(validate_create_request(&req).is_err());
}

#[test]
fn error_taxonomy_maps_to_http_statuses() {
    assert_eq!(
        SagaError::Validation("bad".into()).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(SagaError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(SagaError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        SagaError::Conflict("busy".into()).status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        SagaError::NotFound("gone".into()).status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        SagaError::Transient("db".into()).status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        SagaError::Invariant("broken".into()).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(SagaError::Validation("x".into()).code(), "VALIDATION");
    assert_eq!(SagaError::RateLimited.code(), "RATE_LIMITED");
    assert_eq!(SagaError::Invariant("x".into()).code(), "INVARIANT_VIOLATION");
}

#[test]
fn token_bucket_refills_toward_capacity() {
    // Empty bucket, 30/min refill: one second restores half a token.
    let tokens = refill_tokens(0.0, 100.0, 101.0, 30.0);
    assert!((tokens - 0.5).abs() < 1e-9);

    // Never exceeds capacity.
    let tokens = refill_tokens(29.0, 0.0, 10_000.0, 30.0);
    assert!((tokens - 30.0).abs() < 1e-9);

    // Clock skew backwards does not drain the bucket.
    let tokens = refill_tokens(5.0, 200.0, 100.0, 30.0);
    assert!((tokens - 5.0).abs() < 1e-9);
}

#[test]
fn outbox_attempt_ceiling() {
    assert!(!attempts_exhausted(1, 10));
    assert!(!attempts_exhausted(9, 10));
    assert!(attempts_exhausted(10, 10));
    assert!(attempts_exhausted(11, 10));
}
