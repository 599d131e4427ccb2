//! Configuration management for the coin toss engine

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use nostr::{Keys, SecretKey};
use crate::error::{CoinTossError, GameResult};

/// Main configuration, passed explicitly into `GameRegistry::new`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinTossConfig {
    /// Network configuration
    pub network: NetworkConfig,
    /// Game configuration
    pub game: GameConfig,
    /// Operator (master identity) configuration
    #[serde(default)]
    pub operator: OperatorConfig,
}

/// Network-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Nostr relays to connect to
    pub relays: Vec<String>,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
    /// Publish attempts before a session gives up
    pub retry_attempts: u32,
    /// Linear backoff step between publish attempts
    pub retry_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            relays: vec![
                "wss://relay.damus.io".to_string(),
                "wss://relay.nostrdice.com".to_string(),
                "wss://relay.primal.net".to_string(),
            ],
            connection_timeout: 10,
            retry_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

/// Game-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// How long the creator has to lock funds (seconds)
    pub lock_timeout_secs: u64,
    /// How long an open game waits for an opponent (seconds)
    pub join_timeout_secs: u64,
    /// Maximum number of live sessions
    pub max_concurrent_games: u32,
    /// Minimum locked amount
    pub min_token_amount: u64,
    /// Maximum locked amount
    pub max_token_amount: u64,
    /// Hashtag carried by create commands
    pub command_tag: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 600,      // 10 minutes
            join_timeout_secs: 3600,     // 1 hour
            max_concurrent_games: 100,
            min_token_amount: 1,
            max_token_amount: 1_000_000,
            command_tag: "gamect".to_string(),
        }
    }
}

impl GameConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

/// Operator identity used for the re-broadcast notes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Hex or bech32 secret key of the master account
    pub master_secret_key: Option<String>,
}

impl CoinTossConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> GameResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoinTossError::Configuration {
                message: format!("Failed to read config file: {}", e),
                field: "config_file".to_string(),
            }
        })?;

        let config: CoinTossConfig = toml::from_str(&content).map_err(|e| {
            CoinTossError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                field: "config_format".to_string(),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> GameResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            CoinTossError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                field: "config_serialization".to_string(),
            }
        })?;

        fs::write(path, content).map_err(|e| {
            CoinTossError::Configuration {
                message: format!("Failed to write config file: {}", e),
                field: "config_write".to_string(),
            }
        })?;

        Ok(())
    }

    /// Override relays and operator key from COINTOSS_RELAYS and COINTOSS_MASTER_SK
    pub fn apply_env_overrides(&mut self) {
        if let Ok(relays) = env::var("COINTOSS_RELAYS") {
            let relays: Vec<String> = relays
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
            if !relays.is_empty() {
                self.network.relays = relays;
            }
        }

        if let Ok(secret) = env::var("COINTOSS_MASTER_SK") {
            if !secret.trim().is_empty() {
                self.operator.master_secret_key = Some(secret.trim().to_string());
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> GameResult<()> {
        if self.network.relays.is_empty() {
            return Err(CoinTossError::Configuration {
                message: "At least one relay is required".to_string(),
                field: "network.relays".to_string(),
            });
        }

        if self.network.connection_timeout == 0 {
            return Err(CoinTossError::Configuration {
                message: "Connection timeout must be greater than 0".to_string(),
                field: "network.connection_timeout".to_string(),
            });
        }

        if self.network.retry_attempts == 0 {
            return Err(CoinTossError::Configuration {
                message: "Retry attempts must be greater than 0".to_string(),
                field: "network.retry_attempts".to_string(),
            });
        }

        if self.game.lock_timeout_secs == 0 || self.game.join_timeout_secs == 0 {
            return Err(CoinTossError::Configuration {
                message: "Phase timeouts must be greater than 0".to_string(),
                field: "game.timeouts".to_string(),
            });
        }

        if self.game.max_concurrent_games == 0 {
            return Err(CoinTossError::Configuration {
                message: "Max concurrent games must be greater than 0".to_string(),
                field: "game.max_concurrent_games".to_string(),
            });
        }

        if self.game.min_token_amount == 0 || self.game.min_token_amount > self.game.max_token_amount {
            return Err(CoinTossError::Configuration {
                message: "Min token amount must be positive and not exceed max token amount".to_string(),
                field: "game.token_amounts".to_string(),
            });
        }

        if self.game.command_tag.trim().is_empty() {
            return Err(CoinTossError::Configuration {
                message: "Command tag cannot be empty".to_string(),
                field: "game.command_tag".to_string(),
            });
        }

        if self.operator.master_secret_key.is_some() {
            self.operator_keys()?;
        }

        Ok(())
    }

    /// Parse the operator key, if one is configured
    pub fn operator_keys(&self) -> GameResult<Option<Keys>> {
        match &self.operator.master_secret_key {
            Some(secret) => {
                let secret_key = SecretKey::from_str(secret.trim()).map_err(|e| CoinTossError::Configuration {
                    message: format!("Invalid master secret key: {}", e),
                    field: "operator.master_secret_key".to_string(),
                })?;
                Ok(Some(Keys::new(secret_key)))
            }
            None => Ok(None),
        }
    }

    /// Operator credentials are mandatory for the daemon
    pub fn require_operator(&self) -> GameResult<Keys> {
        self.operator_keys()?.ok_or_else(|| CoinTossError::Configuration {
            message: "COINTOSS_MASTER_SK is required".to_string(),
            field: "operator.master_secret_key".to_string(),
        })
    }

    /// Create a production-ready configuration
    pub fn production() -> Self {
        Self {
            network: NetworkConfig {
                connection_timeout: 5,
                retry_attempts: 5,
                retry_backoff_ms: 1000,
                ..NetworkConfig::default()
            },
            game: GameConfig {
                lock_timeout_secs: 900,
                join_timeout_secs: 86400,
                max_concurrent_games: 500,
                min_token_amount: 10,
                max_token_amount: 100_000,
                ..GameConfig::default()
            },
            operator: OperatorConfig::default(),
        }
    }

    /// Create a development configuration with relaxed settings
    pub fn development() -> Self {
        Self {
            network: NetworkConfig {
                relays: vec![
                    "ws://localhost:8080".to_string(), // Local relay for testing
                ],
                connection_timeout: 30,
                retry_attempts: 2,
                retry_backoff_ms: 100,
            },
            game: GameConfig {
                lock_timeout_secs: 120,
                join_timeout_secs: 300,
                max_concurrent_games: 10,
                min_token_amount: 1,
                max_token_amount: 10_000_000,
                ..GameConfig::default()
            },
            operator: OperatorConfig::default(),
        }
    }
}
