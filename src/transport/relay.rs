//! Relay transport over `nostr_sdk::Client`

use std::collections::HashSet;
use std::time::Duration;
use async_trait::async_trait;
use nostr::{EventBuilder, EventId, Filter, Keys};
use nostr_sdk::{Client, RelayPoolNotification, SubscriptionId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use crate::config::NetworkConfig;
use crate::error::{CoinTossError, GameResult, NetworkError};
use super::{InboundMessage, Subscription, Transport, SUBSCRIPTION_BUFFER};

/// Shared relay connection. Holds no signer; every publish brings its own keys.
#[derive(Clone)]
pub struct RelayTransport {
    client: Client,
}

impl RelayTransport {
    /// Connect to every configured relay
    pub async fn connect(config: &NetworkConfig) -> GameResult<Self> {
        let client = Client::default();

        for relay in &config.relays {
            client.add_relay(relay.as_str()).await.map_err(|e| CoinTossError::Network {
                source: NetworkError::ConnectionFailed {
                    message: e.to_string(),
                },
                context: format!("adding relay {}", relay),
            })?;
        }

        client
            .connect_with_timeout(Duration::from_secs(config.connection_timeout))
            .await;

        info!(relays = config.relays.len(), "Connected to relays");
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn disconnect(&self) {
        let _ = self.client.disconnect().await;
        info!("Disconnected from relays");
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn subscribe(&self, filter: Filter) -> GameResult<Subscription> {
        // Take the receiver before subscribing so no early event is missed
        let mut notifications = self.client.notifications();
        let subscription_id = SubscriptionId::generate();

        self.client
            .subscribe_with_id(subscription_id.clone(), vec![filter], None)
            .await?;

        let (tx, stop, subscription) = Subscription::channel(SUBSCRIPTION_BUFFER);
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut seen: HashSet<EventId> = HashSet::new();

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    received = notifications.recv() => match received {
                        Ok(RelayPoolNotification::Event { subscription_id: id, event, .. }) => {
                            if id != subscription_id || !seen.insert(event.id) {
                                continue;
                            }
                            if tx.send(InboundMessage::from_event(&event)).await.is_err() {
                                break;
                            }
                        }
                        Ok(RelayPoolNotification::Shutdown) => break,
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(subscription = %subscription_id, skipped, "Notification stream lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }

            client.unsubscribe(subscription_id.clone()).await;
            debug!(subscription = %subscription_id, "Subscription closed");
        });

        Ok(subscription)
    }

    async fn publish(&self, signer: &Keys, builder: EventBuilder) -> GameResult<EventId> {
        let event = builder.to_event(signer)?;
        let event_id = event.id;

        self.client.send_event(event).await.map_err(|e| CoinTossError::Network {
            source: NetworkError::PublishFailed {
                attempts: 1,
                message: e.to_string(),
            },
            context: format!("publishing {}", event_id),
        })?;

        debug!(event_id = %event_id, "Published event");
        Ok(event_id)
    }
}
