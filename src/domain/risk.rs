use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskDecision {
    Approve,
    Deny,
    Review,
}

impl RiskDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskDecision::Approve => "APPROVE",
            RiskDecision::Deny => "DENY",
            RiskDecision::Review => "REVIEW",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskThresholds {
    pub velocity_per_hour: i64,
    pub deny_frequency_per_minute: i64,
    pub review_amount_cents: i64,
    pub failed_attempts: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub minute_count: i64,
    pub hour_count: i64,
    pub failure_count: i64,
}

/// Rule order matters: hard denials fire before review routing so a
/// burst-abusive customer is never parked in the manual queue.
pub fn evaluate(
    amount_cents: i64,
    counters: &CounterSnapshot,
    thresholds: &RiskThresholds,
) -> (RiskDecision, &'static str) {
    if counters.minute_count > thresholds.deny_frequency_per_minute {
        return (RiskDecision::Deny, "high_frequency");
    }
    if counters.failure_count >= thresholds.failed_attempts {
        return (RiskDecision::Deny, "failure_rate");
    }
    if amount_cents > thresholds.review_amount_cents {
        return (RiskDecision::Review, "high_amount");
    }
    if counters.hour_count > thresholds.velocity_per_hour {
        return (RiskDecision::Review, "velocity_threshold");
    }
    (RiskDecision::Approve, "rules_passed")
}
