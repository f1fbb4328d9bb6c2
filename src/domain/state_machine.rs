use crate::domain::payment::PaymentState;
use thiserror::Error;

use PaymentState::*;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PaymentState,
    pub to: PaymentState,
}

pub fn allowed_targets(from: PaymentState) -> &'static [PaymentState] {
    match from {
        Created => &[RiskReview, Approved, Failed],
        RiskReview => &[Approved, Failed],
        Approved => &[Authorized, Failed],
        Authorized => &[Captured, Reversed],
        Captured => &[Settled],
        Settled | Failed | Reversed => &[],
    }
}

pub fn is_terminal(state: PaymentState) -> bool {
    allowed_targets(state).is_empty()
}

pub fn validate_transition(from: PaymentState, to: PaymentState) -> Result<(), InvalidTransition> {
    if allowed_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// Whether `observed` sits at or beyond `target` in the lifecycle graph.
/// Used to classify a lost CAS race: an observed forward state means the
/// event was already applied by another worker and can be dropped.
pub fn is_at_or_beyond(observed: PaymentState, target: PaymentState) -> bool {
    if observed == target {
        return true;
    }
    let mut frontier = vec![target];
    let mut seen = vec![target];
    while let Some(state) = frontier.pop() {
        for &next in allowed_targets(state) {
            if next == observed {
                return true;
            }
            if !seen.contains(&next) {
                seen.push(next);
                frontier.push(next);
            }
        }
    }
    false
}
