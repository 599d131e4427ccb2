//! Pub/sub transport boundary
//!
//! Sessions see the network only through [`Transport`]: a filter goes in, a
//! [`Subscription`] of normalized [`InboundMessage`]s comes out, and every
//! outbound event is signed with the keys handed to `publish`.

pub mod relay;

use async_trait::async_trait;
use nostr::{Event, EventBuilder, EventId, Filter, Keys, Kind, PublicKey, Timestamp};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use crate::error::GameResult;

pub use relay::RelayTransport;

/// Default inbox depth for a subscription
pub const SUBSCRIPTION_BUFFER: usize = 64;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Start listening for events matching `filter`
    async fn subscribe(&self, filter: Filter) -> GameResult<Subscription>;

    /// Sign `builder` with `signer` and publish it
    async fn publish(&self, signer: &Keys, builder: EventBuilder) -> GameResult<EventId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    PublicText,
    PrivateEncrypted,
    Other(u16),
}

impl From<Kind> for MessageKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::TextNote => MessageKind::PublicText,
            Kind::EncryptedDirectMessage => MessageKind::PrivateEncrypted,
            other => MessageKind::Other(other.as_u16()),
        }
    }
}

/// Transport-agnostic view of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: EventId,
    pub sender: PublicKey,
    pub content: String,
    pub referenced_events: Vec<EventId>,
    pub referenced_pubkeys: Vec<PublicKey>,
    pub timestamp: Timestamp,
    pub kind: MessageKind,
}

impl InboundMessage {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id,
            sender: event.pubkey,
            content: event.content.clone(),
            referenced_events: event.event_ids().copied().collect(),
            referenced_pubkeys: event.public_keys().copied().collect(),
            timestamp: event.created_at,
            kind: MessageKind::from(event.kind),
        }
    }

    pub fn references_event(&self, id: &EventId) -> bool {
        self.referenced_events.contains(id)
    }
}

/// A live listener: a typed inbox fed by a forwarding task, plus its stop handle
#[derive(Debug)]
pub struct Subscription {
    inbox: mpsc::Receiver<InboundMessage>,
    stop: CancellationToken,
}

impl Subscription {
    pub fn new(inbox: mpsc::Receiver<InboundMessage>, stop: CancellationToken) -> Self {
        Self { inbox, stop }
    }

    /// Create a subscription together with the sender its forwarding task writes to
    pub fn channel(buffer: usize) -> (mpsc::Sender<InboundMessage>, CancellationToken, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        let stop = CancellationToken::new();
        (tx, stop.clone(), Self::new(rx, stop))
    }

    /// Next message, or `None` once stopped or the feed has closed
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        if self.stop.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.stop.cancelled() => None,
            message = self.inbox.recv() => message,
        }
    }

    /// Stop the listener. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.cancel();
        self.inbox.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
