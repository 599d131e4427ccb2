//! Session lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle of a coin toss session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Identities generated from a validated create command
    Created,
    /// Lock request sent, waiting for the creator's locked token
    LockRequested,
    /// Creator's funds verified locked to the escrow key
    Locked,
    /// Announcement published, waiting for an opponent
    Open,
    /// Opponent's matching stake accepted
    JoinReceived,
    /// Outcome drawn and settlement sent to the winner
    Resolved,
    Closed,
    /// Timed out, cancelled or failed; no funds revealed
    Aborted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::LockRequested => "lock_requested",
            SessionState::Locked => "locked",
            SessionState::Open => "open",
            SessionState::JoinReceived => "join_received",
            SessionState::Resolved => "resolved",
            SessionState::Closed => "closed",
            SessionState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Aborted)
    }

    /// The single forward successor, if any
    pub fn next(&self) -> Option<SessionState> {
        match self {
            SessionState::Created => Some(SessionState::LockRequested),
            SessionState::LockRequested => Some(SessionState::Locked),
            SessionState::Locked => Some(SessionState::Open),
            SessionState::Open => Some(SessionState::JoinReceived),
            SessionState::JoinReceived => Some(SessionState::Resolved),
            SessionState::Resolved => Some(SessionState::Closed),
            SessionState::Closed | SessionState::Aborted => None,
        }
    }

    /// Transitions are strictly forward, one step at a time, plus abort from any non-terminal state
    pub fn can_transition_to(&self, new_state: &SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }

        match new_state {
            SessionState::Aborted => true,
            other => self.next().as_ref() == Some(other),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
