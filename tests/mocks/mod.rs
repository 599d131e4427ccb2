//! Mock implementations for testing


pub use nostr_relay::{MockRelay, WAIT_TIMEOUT};
pub use cashu_mint::{MockMint, MockTokenDecoder};
pub use players::{Player, ReceivedDm};

use std::sync::Arc;
use std::time::Duration;
use nostr::{Event, Filter, Kind, PublicKey};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use cointoss::events::{LockRequest, GAME_TAG};
use cointoss::outcome::FixedCoin;
use cointoss::{CoinTossConfig, GameRegistry, GameResult, GameSession, OutcomeResolver, SessionId, SessionState, Side};

pub const MINT_URL: &str = "https://mint.test";

/// Configuration with short phases and fast retries
pub fn test_config() -> CoinTossConfig {
    let mut config = CoinTossConfig::development();
    config.network.retry_attempts = 2;
    config.network.retry_backoff_ms = 10;
    config.game.lock_timeout_secs = 5;
    config.game.join_timeout_secs = 5;
    config
}

/// A game that reached `Open`
pub struct OpenGame {
    pub session_id: SessionId,
    pub game_key: PublicKey,
    pub escrow_key: String,
    pub announcement: Event,
    pub lock_token: String,
}

/// Registry listening on a mock relay, plus a mint to issue stakes
pub struct Harness {
    pub relay: MockRelay,
    pub mint: MockMint,
    pub registry: Arc<GameRegistry>,
    shutdown: CancellationToken,
    listener: JoinHandle<GameResult<()>>,
}

impl Harness {
    /// Start with the coin always landing on `outcome`
    pub async fn start(config: CoinTossConfig, outcome: Side) -> Self {
        Self::start_with_resolver(config, Arc::new(FixedCoin(outcome))).await
    }

    pub async fn start_with_resolver(config: CoinTossConfig, resolver: Arc<dyn OutcomeResolver>) -> Self {
        let relay = MockRelay::new();
        let registry = Arc::new(
            GameRegistry::new(config, Arc::new(relay.clone()), Arc::new(MockTokenDecoder))
                .unwrap()
                .with_resolver(resolver),
        );

        let shutdown = CancellationToken::new();
        let listener = {
            let registry = registry.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { registry.run(shutdown).await })
        };

        let deadline = Instant::now() + WAIT_TIMEOUT;
        while relay.subscription_count() == 0 {
            assert!(Instant::now() < deadline, "registry never subscribed");
            sleep(Duration::from_millis(5)).await;
        }

        Self {
            relay,
            mint: MockMint::new(MINT_URL),
            registry,
            shutdown,
            listener,
        }
    }

    /// Poll a session until `predicate` holds
    pub async fn wait_until<F>(&self, id: &SessionId, predicate: F) -> Option<GameSession>
    where
        F: Fn(&GameSession) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            if let Some(session) = self.registry.lookup(id).await {
                if predicate(&session) {
                    return Some(session);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_state(&self, id: &SessionId, state: SessionState) -> GameSession {
        match self.wait_until(id, |s| s.state() == state).await {
            Some(session) => session,
            None => {
                let actual = self.registry.lookup(id).await.map(|s| s.state());
                panic!("session {} never reached {}, last state {:?}", id, state, actual);
            }
        }
    }

    /// Drive a creator through the lock handshake up to the public announcement
    pub async fn open_game(&self, creator: &Player, side: Side, amounts: &[u64]) -> OpenGame {
        let origin = creator.create_game(&self.relay, side).await;

        let request = creator
            .await_dm(&self.relay, |text| LockRequest::parse_escrow_key(text).is_some())
            .await
            .expect("lock request DM");
        let escrow_key = LockRequest::parse_escrow_key(&request.text).unwrap();

        let lock_token = self.mint.lock_token(&escrow_key, amounts);
        creator
            .send_dm(&self.relay, request.sender, &format!("Here is my stake {}", lock_token))
            .await;

        let announcement = self
            .relay
            .wait_for(&Filter::new().kind(Kind::TextNote).author(request.sender).hashtag(GAME_TAG))
            .await
            .expect("game announcement");

        OpenGame {
            session_id: SessionId::from(origin),
            game_key: request.sender,
            escrow_key,
            announcement,
            lock_token,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.listener.await;
    }
}
