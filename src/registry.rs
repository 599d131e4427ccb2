//! Registry of concurrently running sessions

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use nostr::{EventId, Filter, Kind, PublicKey, Timestamp};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use crate::config::CoinTossConfig;
use crate::error::{CoinTossError, GameResult, NetworkError};
use crate::escrow::TokenDecoder;
use crate::events::CreateCommand;
use crate::outcome::{OutcomeResolver, SecureCoin, Side};
use crate::session::{GameSession, SessionContext, SessionDriver, SessionId, SessionState};
use crate::transport::{InboundMessage, MessageKind, Transport};

/// How often `run` drops finished sessions
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

struct SessionHandle {
    session: Arc<RwLock<GameSession>>,
    cancel: CancellationToken,
    task: JoinHandle<SessionState>,
}

/// Creates, tracks and isolates sessions. Each session owns its identities
/// and runs on its own task.
pub struct GameRegistry {
    config: CoinTossConfig,
    ctx: SessionContext,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl GameRegistry {
    pub fn new(
        config: CoinTossConfig,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn TokenDecoder>,
    ) -> GameResult<Self> {
        config.validate()?;
        let operator = config.operator_keys()?;

        let ctx = SessionContext {
            transport,
            decoder,
            resolver: Arc::new(SecureCoin),
            game: config.game.clone(),
            network: config.network.clone(),
            operator,
        };

        Ok(Self {
            config,
            ctx,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Replace the outcome source
    pub fn with_resolver(mut self, resolver: Arc<dyn OutcomeResolver>) -> Self {
        self.ctx.resolver = resolver;
        self
    }

    pub fn config(&self) -> &CoinTossConfig {
        &self.config
    }

    /// Start a session for a validated create command
    pub async fn create(&self, creator: PublicKey, side: Side, origin: EventId) -> GameResult<SessionId> {
        let id = SessionId::from(origin);
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&id) {
            return Err(CoinTossError::DuplicateSession(id.to_string()));
        }

        let limit = self.config.game.max_concurrent_games;
        let live = sessions.values().filter(|h| !h.task.is_finished()).count();
        if live >= limit as usize {
            return Err(CoinTossError::RegistryFull { limit });
        }

        let session = Arc::new(RwLock::new(GameSession::new(id, creator, side)));
        let cancel = CancellationToken::new();
        let driver = SessionDriver::new(session.clone(), self.ctx.clone(), cancel.clone());
        let task = tokio::spawn(driver.run().instrument(info_span!("session", session_id = %id)));

        sessions.insert(id, SessionHandle { session, cancel, task });
        info!(session_id = %id, creator = %creator, side = %side, "Session created");
        Ok(id)
    }

    /// Validate a create note and start its session
    pub async fn handle_create_command(&self, message: &InboundMessage) -> GameResult<SessionId> {
        if message.kind != MessageKind::PublicText {
            return Err(CoinTossError::InvalidCommand(format!(
                "create commands are public notes, got {:?}",
                message.kind
            )));
        }

        let command = CreateCommand::parse(&message.content)?;
        self.create(message.sender, command.side, message.id).await
    }

    /// Snapshot of a session
    pub async fn lookup(&self, id: &SessionId) -> Option<GameSession> {
        let session = self.sessions.read().await.get(id).map(|h| h.session.clone())?;
        let snapshot = session.read().await.clone();
        Some(snapshot)
    }

    /// Cancel and forget a session, returning its final snapshot
    pub async fn remove(&self, id: &SessionId) -> Option<GameSession> {
        let handle = self.sessions.write().await.remove(id)?;
        handle.cancel.cancel();

        if let Err(e) = handle.task.await {
            warn!(session_id = %id, error = %e, "Session task failed");
        }

        let snapshot = handle.session.read().await.clone();
        info!(session_id = %id, state = %snapshot.state(), "Session removed");
        Some(snapshot)
    }

    /// Drop sessions whose driver has finished
    pub async fn prune_finished(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.task.is_finished());
        let pruned = before - sessions.len();

        if pruned > 0 {
            debug!(pruned, remaining = sessions.len(), "Pruned finished sessions");
        }
        pruned
    }

    /// Sessions whose driver is still running
    pub async fn live_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|h| !h.task.is_finished())
            .count()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Listen for create commands until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) -> GameResult<()> {
        let filter = Filter::new()
            .kind(Kind::TextNote)
            .hashtag(self.config.game.command_tag.clone())
            .since(Timestamp::now());
        let mut commands = self.ctx.transport.subscribe(filter).await?;
        let mut prune = tokio::time::interval(PRUNE_INTERVAL);

        info!(tag = %self.config.game.command_tag, "Listening for create commands");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    commands.stop();
                    info!("Create command listener stopped");
                    return Ok(());
                }
                _ = prune.tick() => {
                    self.prune_finished().await;
                }
                received = commands.recv() => {
                    let Some(message) = received else {
                        return Err(NetworkError::SubscriptionClosed {
                            message: "create command listener closed".to_string(),
                        }
                        .into());
                    };

                    match self.handle_create_command(&message).await {
                        Ok(id) => debug!(session_id = %id, event_id = %message.id, "Create command accepted"),
                        Err(e) => warn!(event_id = %message.id, error = %e, "Create command rejected"),
                    }
                }
            }
        }
    }
}
