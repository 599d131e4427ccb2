//! Async driver running one session to completion

use std::sync::Arc;
use std::time::Duration;
use nostr::{EventBuilder, EventId, Filter, Keys, Kind, PublicKey, Tag, Timestamp};
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::channel;
use crate::config::{GameConfig, NetworkConfig};
use crate::error::{CoinTossError, GameResult, NetworkError};
use crate::escrow::TokenDecoder;
use crate::events::{LockRequest, OperatorNote};
use crate::outcome::OutcomeResolver;
use crate::transport::{InboundMessage, MessageKind, Subscription, Transport};
use super::{GameSession, SessionState};

/// Collaborators shared by every session of a registry
#[derive(Clone)]
pub struct SessionContext {
    pub transport: Arc<dyn Transport>,
    pub decoder: Arc<dyn TokenDecoder>,
    pub resolver: Arc<dyn OutcomeResolver>,
    pub game: GameConfig,
    pub network: NetworkConfig,
    /// Operator identity for re-broadcast notes, if configured
    pub operator: Option<Keys>,
}

/// Drives a [`GameSession`] from `Created` to `Closed` or `Aborted`
pub struct SessionDriver {
    session: Arc<RwLock<GameSession>>,
    ctx: SessionContext,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(session: Arc<RwLock<GameSession>>, ctx: SessionContext, cancel: CancellationToken) -> Self {
        Self { session, ctx, cancel }
    }

    /// Run the session and return its final state
    pub async fn run(self) -> SessionState {
        let session_id = self.session.read().await.id();

        match self.drive().await {
            Ok(()) => {
                info!(session_id = %session_id, "Session closed");
            }
            Err(e) => {
                let mut session = self.session.write().await;
                if !session.state().is_terminal() {
                    warn!(session_id = %session_id, state = %session.state(), error = %e, "Aborting session");
                    if let Err(abort_err) = session.abort(e.to_string()) {
                        error!(session_id = %session_id, error = %abort_err, "Failed to abort session");
                    }
                }
            }
        }

        self.session.read().await.state()
    }

    async fn drive(&self) -> GameResult<()> {
        let lock_listener = self.request_lock().await?;
        self.await_lock(lock_listener).await?;

        let join_listener = self.announce().await?;
        self.await_join(join_listener).await?;

        self.settle().await
    }

    /// Listen for the creator's reply, then DM them the escrow key
    async fn request_lock(&self) -> GameResult<Subscription> {
        let (session_id, keys, secret_key, creator, text) = {
            let session = self.session.read().await;
            (
                session.id(),
                session.game_keys().clone(),
                session.game_secret_key().clone(),
                session.creator(),
                LockRequest::text(session.chosen_side(), session.escrow_public_key()),
            )
        };

        let filter = Filter::new()
            .kind(Kind::EncryptedDirectMessage)
            .author(creator)
            .pubkey(keys.public_key())
            .since(Timestamp::now());
        let listener = self.ctx.transport.subscribe(filter).await?;

        self.session.write().await.mark_lock_requested()?;

        let wire = channel::seal(&text, &secret_key, &creator)?;
        let dm = EventBuilder::new(Kind::EncryptedDirectMessage, wire, [Tag::public_key(creator)]);
        let event_id = self.publish_with_retry(&keys, dm, "lock_request").await?;

        info!(session_id = %session_id, event_id = %event_id, "Lock requested");
        Ok(listener)
    }

    async fn await_lock(&self, mut listener: Subscription) -> GameResult<()> {
        let deadline = Instant::now() + self.ctx.game.lock_timeout();

        loop {
            let message = self.next_message(&mut listener, deadline, "await_lock", self.ctx.game.lock_timeout()).await?;

            match self.handle_lock_message(&message).await {
                Ok(amount) => {
                    listener.stop();
                    let session_id = self.session.read().await.id();
                    info!(session_id = %session_id, event_id = %message.id, amount, "Lock accepted");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    warn!(event_id = %message.id, error = %e, "Discarding lock reply");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn handle_lock_message(&self, message: &InboundMessage) -> GameResult<u64> {
        let secret_key = {
            let session = self.session.read().await;
            self.ensure_foreign(&session, &message.sender)?;
            session.game_secret_key().clone()
        };

        if message.kind != MessageKind::PrivateEncrypted {
            return Err(CoinTossError::Ignored(format!("unexpected {:?} message", message.kind)));
        }

        let plaintext = channel::open(&message.content, &secret_key, &message.sender)?;
        let (token, bundle) = self.ctx.decoder.decode_from_text(&plaintext)?;

        let mut session = self.session.write().await;
        let record = session.accept_lock(
            &message.sender,
            token,
            bundle,
            self.ctx.game.min_token_amount,
            self.ctx.game.max_token_amount,
        )?;
        Ok(record.amount)
    }

    /// Publish the announcement, listen for replies to it, and open the game
    async fn announce(&self) -> GameResult<Subscription> {
        let (session_id, keys, announcement) = {
            let session = self.session.read().await;
            (session.id(), session.game_keys().clone(), session.announcement()?)
        };

        let content = announcement.to_content();
        let announcement_id = self
            .publish_with_retry(&keys, announcement.to_builder(), "announcement")
            .await?;

        // Replies can only reference an id that already exists, so subscribing
        // after publishing misses nothing that relays still hold
        let filter = Filter::new().kind(Kind::TextNote).event(announcement_id);
        let listener = self.ctx.transport.subscribe(filter).await?;

        self.session.write().await.open(announcement_id)?;
        info!(
            session_id = %session_id,
            event_id = %announcement_id,
            amount = announcement.amount,
            side = %announcement.side,
            "Game open"
        );

        self.operator_note(OperatorNote::rebroadcast(&content, announcement_id), "rebroadcast")
            .await;

        Ok(listener)
    }

    async fn await_join(&self, mut listener: Subscription) -> GameResult<()> {
        let deadline = Instant::now() + self.ctx.game.join_timeout();

        loop {
            let message = self.next_message(&mut listener, deadline, "await_join", self.ctx.game.join_timeout()).await?;

            match self.handle_join_message(&message).await {
                Ok(amount) => {
                    listener.stop();
                    let session_id = self.session.read().await.id();
                    info!(
                        session_id = %session_id,
                        event_id = %message.id,
                        opponent = %message.sender,
                        amount,
                        "Join accepted"
                    );
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    warn!(event_id = %message.id, error = %e, "Discarding join reply");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn handle_join_message(&self, message: &InboundMessage) -> GameResult<u64> {
        {
            let session = self.session.read().await;
            self.ensure_foreign(&session, &message.sender)?;

            let referenced = session
                .announcement_id()
                .map(|id| message.references_event(&id))
                .unwrap_or(false);
            if message.kind != MessageKind::PublicText || !referenced {
                return Err(CoinTossError::Ignored("not a reply to the announcement".to_string()));
            }
        }

        let (token, bundle) = self.ctx.decoder.decode_from_text(&message.content)?;

        self.session.write().await.accept_join(&message.sender, token, bundle)
    }

    /// Draw, announce the result, reveal settlement to the winner and close
    async fn settle(&self) -> GameResult<()> {
        let (session_id, keys, secret_key, outcome, result, announcement_id) = {
            let mut session = self.session.write().await;
            let outcome = session.resolve(self.ctx.resolver.as_ref())?;
            let announcement_id = session.announcement_id().unwrap_or_else(|| session.id().event_id());
            (
                session.id(),
                session.game_keys().clone(),
                session.game_secret_key().clone(),
                outcome,
                session.result_announcement()?,
                announcement_id,
            )
        };
        info!(session_id = %session_id, outcome = %outcome, winner = %result.winner, "Outcome drawn");

        self.publish_with_retry(&keys, result.to_builder(announcement_id), "result")
            .await?;

        if self.cancel.is_cancelled() {
            return Err(self.cancelled(session_id));
        }

        let reveal = self.session.read().await.settlement()?;
        let wire = channel::seal(&reveal.to_text(), &secret_key, &result.winner)?;
        let dm = EventBuilder::new(Kind::EncryptedDirectMessage, wire, [Tag::public_key(result.winner)]);
        let event_id = self.publish_with_retry(&keys, dm, "settlement").await?;
        debug!(session_id = %session_id, event_id = %event_id, "Settlement sent to winner");

        self.operator_note(OperatorNote::completed(&result, announcement_id), "completed")
            .await;

        self.session.write().await.close()
    }

    /// Wait for the next message until the phase deadline or cancellation
    async fn next_message(
        &self,
        listener: &mut Subscription,
        deadline: Instant,
        operation: &str,
        window: Duration,
    ) -> GameResult<InboundMessage> {
        let session_id = self.session.read().await.id();

        tokio::select! {
            _ = self.cancel.cancelled() => Err(self.cancelled(session_id)),
            received = timeout_at(deadline, listener.recv()) => match received {
                Ok(Some(message)) => Ok(message),
                Ok(None) => Err(NetworkError::SubscriptionClosed {
                    message: format!("{} listener closed", operation),
                }
                .into()),
                Err(_) => Err(CoinTossError::timeout(operation, window)),
            },
        }
    }

    /// Publish with linear backoff; exhaustion is fatal for the session
    async fn publish_with_retry(&self, signer: &Keys, builder: EventBuilder, what: &str) -> GameResult<EventId> {
        let attempts = self.ctx.network.retry_attempts.max(1);
        let backoff = Duration::from_millis(self.ctx.network.retry_backoff_ms);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.ctx.transport.publish(signer, builder.clone()).await {
                Ok(event_id) => return Ok(event_id),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Publishing {} failed", what);
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        let session_id = self.session.read().await.id();
                        return Err(self.cancelled(session_id));
                    }
                    _ = sleep(backoff * attempt) => {}
                }
            }
        }

        Err(CoinTossError::Network {
            source: NetworkError::PublishFailed {
                attempts,
                message: last_error,
            },
            context: format!("publishing {}", what),
        })
    }

    /// Operator notes are best effort
    async fn operator_note(&self, builder: EventBuilder, what: &str) {
        let Some(operator) = self.ctx.operator.as_ref() else {
            return;
        };

        match self.ctx.transport.publish(operator, builder).await {
            Ok(event_id) => debug!(event_id = %event_id, "Operator {} note published", what),
            Err(e) => warn!(error = %e, "Operator {} note failed", what),
        }
    }

    fn ensure_foreign(&self, session: &GameSession, sender: &PublicKey) -> GameResult<()> {
        if *sender == session.game_public_key() {
            return Err(CoinTossError::Ignored("message from own game identity".to_string()));
        }
        Ok(())
    }

    fn cancelled(&self, session_id: super::SessionId) -> CoinTossError {
        CoinTossError::Aborted {
            session_id: session_id.to_string(),
            reason: "cancelled".to_string(),
        }
    }
}
