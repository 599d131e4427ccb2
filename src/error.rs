//! Error types for the coin toss engine

use thiserror::Error;

/// Main error type for the coin toss engine
#[derive(Debug, Clone, Error)]
pub enum CoinTossError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Network error: {source}")]
    Network {
        source: NetworkError,
        context: String,
    },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: String,
    },

    #[error("Timeout expired: {message}")]
    Timeout {
        message: String,
        duration_ms: u64,
        operation: String,
    },

    #[error("Session {session_id} aborted: {reason}")]
    Aborted {
        session_id: String,
        reason: String,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("The {phase} phase no longer accepts messages")]
    PhaseClosed { phase: &'static str },

    #[error("Message ignored: {0}")]
    Ignored(String),

    #[error("Session already exists for {0}")]
    DuplicateSession(String),

    #[error("Registry is full: {limit} live sessions")]
    RegistryFull { limit: u32 },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Hex decoding error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Nostr error: {0}")]
    Nostr(String),

    #[error("Nostr SDK error: {0}")]
    NostrSdk(String),
}

impl CoinTossError {
    /// Local errors discard the offending message and keep the listener alive.
    /// Everything else escalates the session to `Aborted`.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoinTossError::Channel(_)
                | CoinTossError::Escrow(_)
                | CoinTossError::InvalidCommand(_)
                | CoinTossError::PhaseClosed { .. }
                | CoinTossError::Ignored(_)
                | CoinTossError::Serialization { .. }
                | CoinTossError::HexDecode(_)
        )
    }

    pub fn timeout(operation: &str, duration: std::time::Duration) -> Self {
        CoinTossError::Timeout {
            message: format!("no valid message received within {}s", duration.as_secs()),
            duration_ms: duration.as_millis() as u64,
            operation: operation.to_string(),
        }
    }
}

/// Errors raised while encrypting or decrypting direct messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),
}

/// Errors raised while verifying escrow proof bundles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error("Proof bundle is empty")]
    EmptyBundle,

    #[error("Proof {index} has an invalid commitment: {reason}")]
    InvalidCommitment { index: usize, reason: String },

    #[error("Proof {index} has an invalid amount: {amount}")]
    InvalidAmount { index: usize, amount: u64 },

    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: u64, actual: u64 },

    #[error("Mint mismatch: expected {expected}, got {actual}")]
    MintMismatch { expected: String, actual: String },

    #[error("Unit mismatch: expected {expected}, got {actual}")]
    UnitMismatch { expected: String, actual: String },

    #[error("Proof {index} reuses a proof from the locked bundle")]
    ReusedProof { index: usize },

    #[error("Proof {index} appears more than once in the bundle")]
    DuplicateProof { index: usize },

    #[error("Amount {amount} outside allowed range {min}..={max}")]
    AmountOutOfRange { amount: u64, min: u64, max: u64 },

    #[error("Token decode failed: {0}")]
    Decode(String),
}

/// Network-specific error types
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Publish failed after {attempts} attempts: {message}")]
    PublishFailed { attempts: u32, message: String },

    #[error("Subscription closed: {message}")]
    SubscriptionClosed { message: String },
}

impl From<nostr::event::builder::Error> for CoinTossError {
    fn from(err: nostr::event::builder::Error) -> Self {
        CoinTossError::Nostr(err.to_string())
    }
}

impl From<nostr::key::Error> for CoinTossError {
    fn from(err: nostr::key::Error) -> Self {
        CoinTossError::Nostr(err.to_string())
    }
}

impl From<nostr_sdk::client::Error> for CoinTossError {
    fn from(err: nostr_sdk::client::Error) -> Self {
        CoinTossError::NostrSdk(err.to_string())
    }
}

impl From<NetworkError> for CoinTossError {
    fn from(err: NetworkError) -> Self {
        CoinTossError::Network {
            source: err,
            context: String::new(),
        }
    }
}

impl From<serde_json::Error> for CoinTossError {
    fn from(err: serde_json::Error) -> Self {
        CoinTossError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Type alias for the main result type used throughout the library
pub type GameResult<T> = Result<T, CoinTossError>;

/// Daemon logging setup
pub mod logging {
    use tracing::Level;
    use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

    /// Relay pool chatter drowns out session logs at info
    const QUIET_TARGETS: [&str; 2] = ["nostr_relay_pool=warn", "nostr_sdk=warn"];

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogFormat {
        Human,
        Json,
    }

    /// Level for this crate plus output format. Logs go to stderr.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LoggingConfig {
        pub level: Level,
        pub format: LogFormat,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self { level: Level::INFO, format: LogFormat::Human }
        }
    }

    impl LoggingConfig {
        /// Read COINTOSS_LOG_LEVEL and COINTOSS_LOG_FORMAT through `lookup`; unknown values keep defaults
        pub fn from_lookup<F>(lookup: F) -> Self
        where
            F: Fn(&str) -> Option<String>,
        {
            let mut config = Self::default();
            if let Some(level) = lookup("COINTOSS_LOG_LEVEL").and_then(|l| l.parse::<Level>().ok()) {
                config.level = level;
            }
            if lookup("COINTOSS_LOG_FORMAT").as_deref() == Some("json") {
                config.format = LogFormat::Json;
            }
            config
        }

        /// Filter directives: the crate at `level`, relay internals at warn
        pub fn directives(&self) -> Result<Vec<Directive>, tracing_subscriber::filter::ParseError> {
            let own = format!("cointoss={}", self.level);
            std::iter::once(own.as_str())
                .chain(QUIET_TARGETS)
                .map(|d| d.parse::<Directive>())
                .collect()
        }
    }

    /// Install the global subscriber. RUST_LOG directives are honored on top of ours.
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut env_filter = EnvFilter::builder()
            .with_default_directive(Level::WARN.into())
            .from_env_lossy();
        for directive in config.directives()? {
            env_filter = env_filter.add_directive(directive);
        }

        let registry = tracing_subscriber::registry().with(env_filter);
        match config.format {
            LogFormat::Human => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init()?,
            // Span close events carry the session_id of each finished driver
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_events(fmt::format::FmtSpan::CLOSE)
                        .with_writer(std::io::stderr),
                )
                .try_init()?,
        }

        Ok(())
    }

    pub fn init_from_env() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        init_logging(LoggingConfig::from_lookup(|key| std::env::var(key).ok()))
    }

}
