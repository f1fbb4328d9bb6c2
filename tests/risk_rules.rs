use sagapay::domain::risk::{evaluate, CounterSnapshot, RiskDecision, RiskThresholds};

fn defaults() -> RiskThresholds {
    RiskThresholds {
        velocity_per_hour: 20,
        deny_frequency_per_minute: 50,
        review_amount_cents: 100_000,
        failed_attempts: 3,
    }
}

#[test]
fn quiet_customer_is_approved() {
    let counters = CounterSnapshot {
        minute_count: 1,
        hour_count: 1,
        failure_count: 0,
    };
    let (decision, reason) = evaluate(2_500, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Approve);
    assert_eq!(reason, "rules_passed");
}

#[test]
fn zero_amount_takes_the_normal_path() {
    let counters = CounterSnapshot::default();
    let (decision, _) = evaluate(0, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Approve);
}

#[test]
fn high_amount_routes_to_review() {
    let counters = CounterSnapshot {
        minute_count: 1,
        hour_count: 1,
        failure_count: 0,
    };
    let (decision, reason) = evaluate(150_000, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Review);
    assert_eq!(reason, "high_amount");
}

#[test]
fn amount_at_threshold_is_not_reviewed() {
    let counters = CounterSnapshot::default();
    let (decision, _) = evaluate(100_000, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Approve);

    let (decision, _) = evaluate(100_001, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Review);
}

#[test]
fn hourly_velocity_routes_to_review() {
    let counters = CounterSnapshot {
        minute_count: 2,
        hour_count: 21,
        failure_count: 0,
    };
    let (decision, reason) = evaluate(2_500, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Review);
    assert_eq!(reason, "velocity_threshold");
}

#[test]
fn burst_frequency_is_denied_even_for_large_amounts() {
    let counters = CounterSnapshot {
        minute_count: 51,
        hour_count: 51,
        failure_count: 0,
    };
    let (decision, reason) = evaluate(150_000, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Deny);
    assert_eq!(reason, "high_frequency");
}

#[test]
fn repeated_failures_are_denied_before_review_rules() {
    let counters = CounterSnapshot {
        minute_count: 1,
        hour_count: 1,
        failure_count: 3,
    };
    let (decision, reason) = evaluate(150_000, &counters, &defaults());
    assert_eq!(decision, RiskDecision::Deny);
    assert_eq!(reason, "failure_rate");
}
