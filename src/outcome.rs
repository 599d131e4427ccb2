//! Coin sides and outcome drawing

use std::fmt;
use std::str::FromStr;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use crate::error::CoinTossError;

/// The two faces of the coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "head")]
    Heads,
    #[serde(rename = "tail")]
    Tails,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Heads => "head",
            Side::Tails => "tail",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Heads => Side::Tails,
            Side::Tails => Side::Heads,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = CoinTossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" | "heads" => Ok(Side::Heads),
            "tail" | "tails" => Ok(Side::Tails),
            other => Err(CoinTossError::InvalidCommand(format!("unknown side: {}", other))),
        }
    }
}

/// Source of coin toss outcomes. Called once per session.
pub trait OutcomeResolver: Send + Sync {
    fn draw(&self) -> Side;
}

/// Draws from the OS RNG: one byte, low bit decides
#[derive(Debug, Clone, Default)]
pub struct SecureCoin;

impl OutcomeResolver for SecureCoin {
    fn draw(&self) -> Side {
        let mut byte = [0u8; 1];
        OsRng.fill_bytes(&mut byte);
        if byte[0] % 2 == 0 {
            Side::Heads
        } else {
            Side::Tails
        }
    }
}

/// Always lands on the same side
#[derive(Debug, Clone)]
pub struct FixedCoin(pub Side);

impl OutcomeResolver for FixedCoin {
    fn draw(&self) -> Side {
        self.0
    }
}
