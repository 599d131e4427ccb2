//! cointoss - A coin toss wagering engine over Nostr with Cashu ecash escrow
//!
//! Players talk to the engine through:
//! - Encrypted direct messages for the private lock handshake
//! - Public notes for game announcements, joins and results
//! - Cashu ecash tokens P2PK-locked to a per-game escrow key
//!
//! Each game runs as an isolated session with its own identities.

pub mod channel;
pub mod config;
pub mod error;
pub mod escrow;
pub mod events;
pub mod outcome;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export commonly used types for convenience
pub use error::{CoinTossError, ChannelError, EscrowError, NetworkError, GameResult};

// Re-export escrow types
pub use escrow::{EcashProofBundle, Proof, EscrowVerifier, LockSummary, TokenDecoder, CdkTokenDecoder};

// Re-export session and registry types
pub use session::{GameSession, SessionId, SessionState, LockRecord, JoinRecord};
pub use registry::GameRegistry;
pub use outcome::{Side, OutcomeResolver, SecureCoin};

// Re-export transport interfaces
pub use transport::{Transport, Subscription, InboundMessage, MessageKind, RelayTransport};

// Re-export configuration interfaces
pub use config::{CoinTossConfig, NetworkConfig, GameConfig, OperatorConfig};

// Re-export external dependencies for user convenience
pub use nostr::{Event, EventId, PublicKey, Keys};
