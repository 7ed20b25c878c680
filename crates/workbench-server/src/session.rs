//! Per-connection protocol state machine
//!
//! A [`Session`] does no IO. The worker pushes received bytes in with
//! [`Session::feed`] and pulls decisions out with [`Session::poll`]:
//!
//! ```text
//! AwaitingLogin --login ok--> AwaitingCommand --Model:n / Algorithm:n--> ReceivingPayload
//!                                    ^                                        |
//!                                    +------------- n bytes buffered ---------+
//! any state --close--> Closed
//! ```
//!
//! Lines that do not parse, and logins that are not on the allow-list, are
//! dropped without a reply and without a state change. There is no limit on
//! attempts.

use crate::config::Account;
use crate::error::StateMachineError;
use crate::protocol::{PayloadKind, LOGIN};
use std::sync::Arc;

/// Longest command line kept while waiting for its `\n`; longer input is
/// discarded as an unparseable line
pub const MAX_LINE_LEN: usize = 4096;

/// Upper bound on the buffer reserved up front for a declared payload
const MAX_PREALLOCATION: usize = 1 << 20;

/// Protocol state with its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingLogin,
    AwaitingCommand,
    ReceivingPayload { kind: PayloadKind, expected: usize },
    Closed,
}

impl SessionState {
    /// Data-free phase of this state
    #[must_use]
    pub fn phase(self) -> SessionPhase {
        match self {
            SessionState::AwaitingLogin => SessionPhase::AwaitingLogin,
            SessionState::AwaitingCommand => SessionPhase::AwaitingCommand,
            SessionState::ReceivingPayload { .. } => SessionPhase::ReceivingPayload,
            SessionState::Closed => SessionPhase::Closed,
        }
    }
}

/// State discriminant used for transition rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    AwaitingLogin,
    AwaitingCommand,
    ReceivingPayload,
    Closed,
}

/// Validates a state transition.
pub fn validate_transition(from: SessionPhase, to: SessionPhase) -> Result<(), StateMachineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: SessionPhase) -> Vec<SessionPhase> {
    use SessionPhase::*;
    match from {
        AwaitingLogin => vec![AwaitingCommand, Closed],
        AwaitingCommand => vec![ReceivingPayload, Closed],
        ReceivingPayload => vec![AwaitingCommand, Closed],
        Closed => vec![],
    }
}

/// Something the worker has to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login accepted
    LoggedIn { username: String },
    /// A declared-length payload is complete
    PayloadComplete {
        kind: PayloadKind,
        expected: usize,
        payload: Vec<u8>,
    },
}

/// Protocol state of one connection
#[derive(Debug)]
pub struct Session {
    accounts: Arc<[Account]>,
    state: SessionState,
    /// Received bytes not yet consumed
    input: Vec<u8>,
    /// In-flight payload
    payload: Vec<u8>,
    username: Option<String>,
}

impl Session {
    /// Create session checking logins against `accounts`
    #[must_use]
    pub fn new(accounts: Arc<[Account]>) -> Self {
        Self {
            accounts,
            state: SessionState::AwaitingLogin,
            input: Vec::new(),
            payload: Vec::new(),
            username: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Account name after a successful login
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Bytes still missing from the in-flight payload (0 when none)
    #[must_use]
    pub fn expected_bytes(&self) -> usize {
        match self.state {
            SessionState::ReceivingPayload { expected, .. } => expected - self.payload.len(),
            _ => 0,
        }
    }

    /// Bytes of the in-flight payload received so far
    #[must_use]
    pub fn buffered_payload(&self) -> usize {
        self.payload.len()
    }

    /// Append received bytes; ignored once closed
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.state != SessionState::Closed {
            self.input.extend_from_slice(bytes);
        }
    }

    /// Advance on buffered input
    ///
    /// Returns `Ok(None)` once more input is needed.
    ///
    /// # Errors
    /// Returns `StateMachineError` on an illegal internal transition
    pub fn poll(&mut self) -> Result<Option<SessionEvent>, StateMachineError> {
        loop {
            match self.state {
                SessionState::Closed => return Ok(None),
                SessionState::AwaitingLogin => {
                    let Some(line) = self.next_line() else {
                        return Ok(None);
                    };
                    if let Some(username) = self.check_login(&line) {
                        self.transition(SessionState::AwaitingCommand)?;
                        self.username = Some(username.clone());
                        return Ok(Some(SessionEvent::LoggedIn { username }));
                    }
                    tracing::debug!("ignored line while awaiting login");
                }
                SessionState::AwaitingCommand => {
                    let Some(line) = self.next_line() else {
                        return Ok(None);
                    };
                    if let Some((kind, expected)) = parse_command(&line) {
                        tracing::debug!(%kind, expected, "payload announced");
                        self.transition(SessionState::ReceivingPayload { kind, expected })?;
                        self.payload = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
                    } else {
                        tracing::debug!(line = %line, "ignored line while awaiting command");
                    }
                }
                SessionState::ReceivingPayload { kind, expected } => {
                    let take = (expected - self.payload.len()).min(self.input.len());
                    self.payload.extend(self.input.drain(..take));

                    if self.payload.len() < expected {
                        return Ok(None);
                    }
                    let payload = std::mem::take(&mut self.payload);
                    self.transition(SessionState::AwaitingCommand)?;
                    return Ok(Some(SessionEvent::PayloadComplete {
                        kind,
                        expected,
                        payload,
                    }));
                }
            }
        }
    }

    /// Drop an in-flight payload and wait for the next command
    ///
    /// Returns the number of payload bytes discarded.
    ///
    /// # Errors
    /// Returns `StateMachineError` if no payload is in flight
    pub fn abort_payload(&mut self) -> Result<usize, StateMachineError> {
        if self.phase() != SessionPhase::ReceivingPayload {
            return Err(StateMachineError::IllegalTransition {
                from: self.phase(),
                to: SessionPhase::AwaitingCommand,
            });
        }
        self.transition(SessionState::AwaitingCommand)?;
        let discarded = self.payload.len();
        self.payload = Vec::new();
        Ok(discarded)
    }

    /// Enter the terminal state; further input is ignored
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            self.input = Vec::new();
            self.payload = Vec::new();
        }
    }

    fn transition(&mut self, to: SessionState) -> Result<(), StateMachineError> {
        validate_transition(self.state.phase(), to.phase())?;
        self.state = to;
        Ok(())
    }

    /// Next complete line, decoded as Latin-1 and trimmed
    fn next_line(&mut self) -> Option<String> {
        let Some(end) = self.input.iter().position(|&b| b == b'\n') else {
            if self.input.len() > MAX_LINE_LEN {
                tracing::debug!(len = self.input.len(), "discarding overlong line");
                self.input.clear();
            }
            return None;
        };
        let line: String = self.input.drain(..=end).map(char::from).collect();
        Some(line.trim().to_string())
    }

    fn check_login(&self, line: &str) -> Option<String> {
        let parts: Vec<&str> = line.split(':').collect();
        let [keyword, user, pass] = parts.as_slice() else {
            return None;
        };
        if *keyword != LOGIN {
            return None;
        }
        self.accounts
            .iter()
            .any(|account| account.matches(user, pass))
            .then(|| (*user).to_string())
    }
}

/// `Model:<n>` or `Algorithm:<n>` with `n` a non-negative integer
fn parse_command(line: &str) -> Option<(PayloadKind, usize)> {
    let (keyword, len) = line.split_once(':')?;
    if len.contains(':') {
        return None;
    }
    let kind = PayloadKind::from_keyword(keyword)?;
    let expected = len.parse::<usize>().ok()?;
    Some((kind, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn accounts() -> Arc<[Account]> {
        vec![Account::new("alice", "secret"), Account::new("bob", "hunter2")].into()
    }

    fn logged_in() -> Session {
        let mut session = Session::new(accounts());
        session.feed(b"login:alice:secret\n");
        assert!(matches!(session.poll(), Ok(Some(SessionEvent::LoggedIn { .. }))));
        session
    }

    #[test]
    fn valid_login() {
        let mut session = Session::new(accounts());
        session.feed(b"login:bob:hunter2\r\n");
        assert_eq!(
            session.poll().unwrap(),
            Some(SessionEvent::LoggedIn {
                username: "bob".to_string()
            })
        );
        assert_eq!(session.phase(), SessionPhase::AwaitingCommand);
        assert!(session.is_authenticated());
        assert_eq!(session.username(), Some("bob"));
    }

    #[test]
    fn invalid_logins_are_ignored() {
        let mut session = Session::new(accounts());
        for line in [
            "login:alice:wrong\n",
            "login:mallory:secret\n",
            "login:alice\n",
            "login:alice:secret:extra\n",
            "LOGIN:alice:secret\n",
            "Model:10\n",
            "\n",
        ] {
            session.feed(line.as_bytes());
            assert_eq!(session.poll().unwrap(), None, "{line:?}");
            assert_eq!(session.phase(), SessionPhase::AwaitingLogin);
        }
        assert!(!session.is_authenticated());

        // Retries are unbounded
        session.feed(b"login:alice:secret\n");
        assert!(session.poll().unwrap().is_some());
    }

    #[test]
    fn login_split_across_reads() {
        let mut session = Session::new(accounts());
        session.feed(b"login:ali");
        assert_eq!(session.poll().unwrap(), None);
        session.feed(b"ce:secret\n");
        assert!(session.poll().unwrap().is_some());
    }

    #[test]
    fn command_enters_receiving_payload() {
        let mut session = logged_in();
        session.feed(b"Model:5\n");
        assert_eq!(session.poll().unwrap(), None);
        assert_eq!(
            session.state(),
            SessionState::ReceivingPayload {
                kind: PayloadKind::Model,
                expected: 5
            }
        );
        assert_eq!(session.expected_bytes(), 5);
    }

    #[test]
    fn bad_commands_are_ignored() {
        let mut session = logged_in();
        for line in [
            "Model\n",
            "Model:-3\n",
            "Model:abc\n",
            "Model:1:2\n",
            "Image:10\n",
            "login:alice:secret\n",
        ] {
            session.feed(line.as_bytes());
            assert_eq!(session.poll().unwrap(), None, "{line:?}");
            assert_eq!(session.phase(), SessionPhase::AwaitingCommand);
        }
    }

    #[test]
    fn payload_completes_at_exact_length() {
        let mut session = logged_in();
        session.feed(b"Algorithm:6\nabc");
        assert_eq!(session.poll().unwrap(), None);
        assert_eq!(session.buffered_payload(), 3);
        assert_eq!(session.expected_bytes(), 3);

        session.feed(b"def");
        assert_eq!(
            session.poll().unwrap(),
            Some(SessionEvent::PayloadComplete {
                kind: PayloadKind::Algorithm,
                expected: 6,
                payload: b"abcdef".to_vec()
            })
        );
        assert_eq!(session.phase(), SessionPhase::AwaitingCommand);
        assert_eq!(session.expected_bytes(), 0);
    }

    #[test]
    fn payload_bytes_are_not_commands() {
        let mut session = logged_in();
        session.feed(b"Model:10\nModel:3\nxy");
        assert_eq!(session.poll().unwrap(), None);
        session.feed(b"z");
        match session.poll().unwrap() {
            Some(SessionEvent::PayloadComplete { payload, .. }) => {
                assert_eq!(payload, b"Model:3\nxyz");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trailing_bytes_start_next_command() {
        let mut session = logged_in();
        session.feed(b"Model:2\nabModel:1\nc");
        assert!(matches!(
            session.poll().unwrap(),
            Some(SessionEvent::PayloadComplete { ref payload, .. }) if payload == b"ab"
        ));
        assert!(matches!(
            session.poll().unwrap(),
            Some(SessionEvent::PayloadComplete { ref payload, .. }) if payload == b"c"
        ));
        assert_eq!(session.poll().unwrap(), None);
    }

    #[test]
    fn zero_length_payload_completes_immediately() {
        let mut session = logged_in();
        session.feed(b"Model:0\n");
        assert!(matches!(
            session.poll().unwrap(),
            Some(SessionEvent::PayloadComplete { expected: 0, ref payload, .. }) if payload.is_empty()
        ));
    }

    #[test]
    fn abort_payload_returns_to_command() {
        let mut session = logged_in();
        session.feed(b"Model:10\nabcd");
        assert_eq!(session.poll().unwrap(), None);
        assert_eq!(session.abort_payload().unwrap(), 4);
        assert_eq!(session.phase(), SessionPhase::AwaitingCommand);
        assert!(session.abort_payload().is_err());

        let mut fresh = Session::new(accounts());
        assert!(fresh.abort_payload().is_err());
        assert_eq!(fresh.phase(), SessionPhase::AwaitingLogin);
    }

    #[test]
    fn closed_ignores_everything() {
        let mut session = logged_in();
        session.close();
        session.feed(b"Model:1\nx");
        assert_eq!(session.poll().unwrap(), None);
        assert_eq!(session.phase(), SessionPhase::Closed);
        session.close();
        assert_eq!(session.phase(), SessionPhase::Closed);
    }

    #[test]
    fn overlong_line_is_discarded() {
        let mut session = Session::new(accounts());
        session.feed(&vec![b'x'; MAX_LINE_LEN + 1]);
        assert_eq!(session.poll().unwrap(), None);
        session.feed(b"\nlogin:alice:secret\n");
        // The tail of the overlong line is dropped as one ignored line
        assert!(session.poll().unwrap().is_some());
    }

    #[test]
    fn transition_table() {
        use SessionPhase::*;
        assert!(validate_transition(AwaitingLogin, AwaitingCommand).is_ok());
        assert!(validate_transition(AwaitingLogin, ReceivingPayload).is_err());
        assert!(validate_transition(AwaitingCommand, AwaitingLogin).is_err());
        assert!(validate_transition(ReceivingPayload, AwaitingCommand).is_ok());
        assert!(validate_transition(Closed, AwaitingLogin).is_err());
        for phase in [AwaitingLogin, AwaitingCommand, ReceivingPayload] {
            assert!(validate_transition(phase, Closed).is_ok());
        }
    }

    proptest! {
        #[test]
        fn prop_partial_payload_never_completes(n in 1usize..512, cut in 0usize..512) {
            let m = cut % n;
            let mut session = logged_in();
            session.feed(format!("Model:{n}\n").as_bytes());
            session.feed(&vec![7u8; m]);
            prop_assert_eq!(session.poll().unwrap(), None);
            prop_assert_eq!(session.buffered_payload(), m);

            session.feed(&vec![7u8; n - m]);
            let completed = matches!(
                session.poll().unwrap(),
                Some(SessionEvent::PayloadComplete { ref payload, .. }) if payload.len() == n
            );
            prop_assert!(completed);
        }

        #[test]
        fn prop_unknown_credentials_stay_unauthenticated(
            user in "[a-z]{1,8}",
            pass in "[a-z0-9]{1,8}",
        ) {
            prop_assume!(!(user == "alice" && pass == "secret"));
            prop_assume!(!(user == "bob" && pass == "hunter2"));
            let mut session = Session::new(accounts());
            session.feed(format!("login:{user}:{pass}\n").as_bytes());
            prop_assert_eq!(session.poll().unwrap(), None);
            prop_assert_eq!(session.phase(), SessionPhase::AwaitingLogin);
        }
    }
}
