use proptest::prelude::*;
use std::sync::Arc;
use workbench_server::session::{allowed_transitions, validate_transition};
use workbench_server::{Account, Session, SessionEvent, SessionPhase};

fn any_phase() -> impl Strategy<Value = SessionPhase> {
    prop_oneof![
        Just(SessionPhase::AwaitingLogin),
        Just(SessionPhase::AwaitingCommand),
        Just(SessionPhase::ReceivingPayload),
        Just(SessionPhase::Closed),
    ]
}

#[test]
fn test_login_transitions() {
    assert!(validate_transition(SessionPhase::AwaitingLogin, SessionPhase::AwaitingCommand).is_ok());
    assert!(validate_transition(SessionPhase::AwaitingLogin, SessionPhase::Closed).is_ok());

    // Payloads are only accepted after login
    assert!(validate_transition(SessionPhase::AwaitingLogin, SessionPhase::ReceivingPayload).is_err());
}

#[test]
fn test_closed_is_terminal() {
    assert!(allowed_transitions(SessionPhase::Closed).is_empty());
}

#[test]
fn test_full_request_cycle() {
    let accounts: Arc<[Account]> = vec![Account::new("alice", "secret")].into();
    let mut session = Session::new(accounts);
    let mut phases = vec![session.phase()];

    session.feed(b"login:alice:secret\n");
    assert!(matches!(session.poll(), Ok(Some(SessionEvent::LoggedIn { .. }))));
    phases.push(session.phase());

    session.feed(b"Model:3\n");
    assert!(matches!(session.poll(), Ok(None)));
    phases.push(session.phase());

    session.feed(b"abc");
    assert!(matches!(session.poll(), Ok(Some(SessionEvent::PayloadComplete { .. }))));
    phases.push(session.phase());

    session.close();
    phases.push(session.phase());

    for pair in phases.windows(2) {
        assert!(validate_transition(pair[0], pair[1]).is_ok(), "{pair:?}");
    }
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_phase(), to in any_phase()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_no_self_transitions(phase in any_phase()) {
        prop_assert!(validate_transition(phase, phase).is_err());
    }
}
