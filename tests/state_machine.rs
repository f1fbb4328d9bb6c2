use sagapay::domain::payment::PaymentState;
use sagapay::domain::state_machine::{
    allowed_targets, is_at_or_beyond, is_terminal, validate_transition,
};

use PaymentState::*;

#[test]
fn accepts_every_transition_in_the_table() {
    let table = [
        (Created, RiskReview),
        (Created, Approved),
        (Created, Failed),
        (RiskReview, Approved),
        (RiskReview, Failed),
        (Approved, Authorized),
        (Approved, Failed),
        (Authorized, Captured),
        (Authorized, Reversed),
        (Captured, Settled),
    ];
    for (from, to) in table {
        assert!(
            validate_transition(from, to).is_ok(),
            "expected {from} -> {to} to be legal"
        );
    }
}

#[test]
fn rejects_everything_off_the_table() {
    let all = [
        Created, RiskReview, Approved, Authorized, Captured, Settled, Failed, Reversed,
    ];
    let mut checked = 0;
    for from in all {
        for to in all {
            if allowed_targets(from).contains(&to) {
                continue;
            }
            let err = validate_transition(from, to).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.to, to);
            checked += 1;
        }
    }
    // 64 pairs minus the 10 legal edges.
    assert_eq!(checked, 54);
}

#[test]
fn skipping_states_is_rejected() {
    assert!(validate_transition(Created, Settled).is_err());
    assert!(validate_transition(Created, Captured).is_err());
    assert!(validate_transition(Approved, Captured).is_err());
}

#[test]
fn terminal_states_have_no_exits() {
    for state in [Settled, Failed, Reversed] {
        assert!(is_terminal(state));
        assert!(allowed_targets(state).is_empty());
    }
    for state in [Created, RiskReview, Approved, Authorized, Captured] {
        assert!(!is_terminal(state));
    }
}

#[test]
fn forward_states_classify_as_already_applied() {
    assert!(is_at_or_beyond(Approved, Approved));
    assert!(is_at_or_beyond(Authorized, Approved));
    assert!(is_at_or_beyond(Settled, Captured));
    assert!(is_at_or_beyond(Settled, Approved));
    assert!(is_at_or_beyond(Failed, Approved));
    assert!(is_at_or_beyond(Reversed, Authorized));
}

#[test]
fn backward_states_classify_as_conflicts() {
    assert!(!is_at_or_beyond(Created, Approved));
    assert!(!is_at_or_beyond(Created, Settled));
    assert!(!is_at_or_beyond(Approved, Authorized));
    assert!(!is_at_or_beyond(RiskReview, Captured));
}

#[test]
fn state_names_round_trip() {
    for state in [
        Created, RiskReview, Approved, Authorized, Captured, Settled, Failed, Reversed,
    ] {
        assert_eq!(PaymentState::parse(state.as_str()), Some(state));
    }
    assert_eq!(PaymentState::parse("SHIPPED"), None);
}
