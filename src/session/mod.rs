//! Coin toss session state machine
//!
//! [`GameSession`] holds everything one game knows and enforces the state
//! transitions synchronously. The async side (listening, publishing,
//! timeouts) lives in [`driver`].

pub mod driver;
pub mod identity;
pub mod state;

use std::fmt;
use chrono::{DateTime, Utc};
use nostr::{EventId, Keys, PublicKey, SecretKey};
use crate::error::{CoinTossError, EscrowError, GameResult};
use crate::escrow::{EcashProofBundle, EscrowVerifier, LockSummary};
use crate::events::{Announcement, ResultAnnouncement, SettlementReveal};
use crate::outcome::{OutcomeResolver, Side};

pub use driver::{SessionContext, SessionDriver};
pub use identity::{EscrowIdentity, GameIdentity};
pub use state::SessionState;

/// Identifies a session by the event id of its create command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub EventId);

impl SessionId {
    pub fn event_id(&self) -> EventId {
        self.0
    }
}

impl From<EventId> for SessionId {
    fn from(id: EventId) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

/// The creator's verified stake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub amount: u64,
    pub mint: String,
    pub unit: String,
    pub token: String,
    pub bundle: EcashProofBundle,
}

impl LockRecord {
    pub fn summary(&self) -> LockSummary {
        LockSummary {
            total: self.amount,
            mint: self.mint.clone(),
            unit: self.unit.clone(),
        }
    }
}

/// The opponent's accepted stake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRecord {
    pub opponent: PublicKey,
    pub amount: u64,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: SessionId,
    creator: PublicKey,
    chosen_side: Side,
    game_identity: GameIdentity,
    escrow_identity: EscrowIdentity,
    state: SessionState,
    lock: Option<LockRecord>,
    announcement_id: Option<EventId>,
    join: Option<JoinRecord>,
    outcome: Option<Side>,
    created_at: DateTime<Utc>,
    abort_reason: Option<String>,
}

impl GameSession {
    /// New session with fresh game and escrow identities
    pub fn new(id: SessionId, creator: PublicKey, chosen_side: Side) -> Self {
        Self {
            id,
            creator,
            chosen_side,
            game_identity: GameIdentity::generate(),
            escrow_identity: EscrowIdentity::generate(),
            state: SessionState::Created,
            lock: None,
            announcement_id: None,
            join: None,
            outcome: None,
            created_at: Utc::now(),
            abort_reason: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn creator(&self) -> PublicKey {
        self.creator
    }

    pub fn chosen_side(&self) -> Side {
        self.chosen_side
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game_keys(&self) -> &Keys {
        self.game_identity.keys()
    }

    pub fn game_secret_key(&self) -> &SecretKey {
        self.game_identity.secret_key()
    }

    pub fn game_public_key(&self) -> PublicKey {
        self.game_identity.public_key()
    }

    pub fn escrow_public_key(&self) -> &str {
        self.escrow_identity.public_key_hex()
    }

    pub fn lock(&self) -> Option<&LockRecord> {
        self.lock.as_ref()
    }

    pub fn announcement_id(&self) -> Option<EventId> {
        self.announcement_id
    }

    pub fn join(&self) -> Option<&JoinRecord> {
        self.join.as_ref()
    }

    pub fn opponent(&self) -> Option<PublicKey> {
        self.join.as_ref().map(|j| j.opponent)
    }

    pub fn outcome(&self) -> Option<Side> {
        self.outcome
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Creator if the coin matches their side, opponent otherwise
    pub fn winner(&self) -> Option<PublicKey> {
        let outcome = self.outcome?;
        if outcome == self.chosen_side {
            Some(self.creator)
        } else {
            self.opponent()
        }
    }

    fn transition(&mut self, to: SessionState) -> GameResult<()> {
        if !self.state.can_transition_to(&to) {
            return Err(CoinTossError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn mark_lock_requested(&mut self) -> GameResult<()> {
        self.transition(SessionState::LockRequested)
    }

    /// Accept the creator's locked token. Only the first valid one gets through.
    pub fn accept_lock(
        &mut self,
        sender: &PublicKey,
        token: &str,
        bundle: EcashProofBundle,
        min_amount: u64,
        max_amount: u64,
    ) -> GameResult<&LockRecord> {
        if self.state != SessionState::LockRequested {
            return Err(CoinTossError::PhaseClosed { phase: "lock" });
        }

        if *sender != self.creator {
            return Err(CoinTossError::Ignored(format!(
                "lock reply from {} who is not the creator",
                sender
            )));
        }

        let summary = EscrowVerifier::verify_lock(&bundle, self.escrow_identity.public_key_hex())?;
        EscrowVerifier::verify_range(summary.total, min_amount, max_amount)?;

        self.transition(SessionState::Locked)?;
        Ok(&*self.lock.insert(LockRecord {
            amount: summary.total,
            mint: summary.mint,
            unit: summary.unit,
            token: token.to_string(),
            bundle,
        }))
    }

    /// Public announcement for the locked stake
    pub fn announcement(&self) -> GameResult<Announcement> {
        let lock = self.lock.as_ref().ok_or_else(|| CoinTossError::InvalidTransition {
            from: self.state.to_string(),
            to: SessionState::Open.to_string(),
        })?;

        Ok(Announcement {
            side: self.chosen_side,
            amount: lock.amount,
            unit: lock.unit.clone(),
            mint: lock.mint.clone(),
            escrow: self.escrow_identity.public_key_hex().to_string(),
        })
    }

    pub fn open(&mut self, announcement_id: EventId) -> GameResult<()> {
        self.transition(SessionState::Open)?;
        self.announcement_id = Some(announcement_id);
        Ok(())
    }

    /// Accept an opponent's matching stake. Only the first valid one gets through.
    pub fn accept_join(
        &mut self,
        sender: &PublicKey,
        token: &str,
        bundle: EcashProofBundle,
    ) -> GameResult<u64> {
        if self.state != SessionState::Open {
            return Err(CoinTossError::PhaseClosed { phase: "join" });
        }

        if *sender == self.creator {
            return Err(CoinTossError::Ignored("creator cannot join their own game".to_string()));
        }

        let lock = self.lock.as_ref().ok_or(CoinTossError::PhaseClosed { phase: "join" })?;
        let amount = EscrowVerifier::verify_match(&bundle, &lock.summary(), self.escrow_identity.public_key_hex())?;

        if let Some(index) = bundle.shares_secret_with(&lock.bundle) {
            return Err(EscrowError::ReusedProof { index }.into());
        }

        self.transition(SessionState::JoinReceived)?;
        self.join = Some(JoinRecord {
            opponent: *sender,
            amount,
            token: token.to_string(),
        });
        Ok(amount)
    }

    /// Draw the outcome once; a stored outcome is returned as is
    pub fn resolve(&mut self, resolver: &dyn OutcomeResolver) -> GameResult<Side> {
        if let Some(outcome) = self.outcome {
            return Ok(outcome);
        }

        self.transition(SessionState::Resolved)?;
        let outcome = resolver.draw();
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    pub fn result_announcement(&self) -> GameResult<ResultAnnouncement> {
        let (outcome, winner, lock) = match (self.outcome, self.winner(), self.lock.as_ref()) {
            (Some(outcome), Some(winner), Some(lock)) => (outcome, winner, lock),
            _ => {
                return Err(CoinTossError::InvalidTransition {
                    from: self.state.to_string(),
                    to: SessionState::Resolved.to_string(),
                })
            }
        };

        let join_amount = self.join.as_ref().map(|j| j.amount).unwrap_or_default();
        Ok(ResultAnnouncement {
            outcome,
            winner,
            pot: lock.amount.saturating_add(join_amount),
            unit: lock.unit.clone(),
        })
    }

    /// Settlement material for the winner. Only available once resolved.
    pub fn settlement(&self) -> GameResult<SettlementReveal> {
        match (self.state, self.lock.as_ref(), self.join.as_ref()) {
            (SessionState::Resolved, Some(lock), Some(join)) => Ok(SettlementReveal {
                escrow_secret_key: self.escrow_identity.secret_key_hex(),
                lock_token: lock.token.clone(),
                join_token: join.token.clone(),
            }),
            _ => Err(CoinTossError::InvalidTransition {
                from: self.state.to_string(),
                to: SessionState::Closed.to_string(),
            }),
        }
    }

    pub fn close(&mut self) -> GameResult<()> {
        self.transition(SessionState::Closed)
    }

    pub fn abort(&mut self, reason: impl Into<String>) -> GameResult<()> {
        self.transition(SessionState::Aborted)?;
        self.abort_reason = Some(reason.into());
        Ok(())
    }
}
