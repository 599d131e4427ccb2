//! Create commands and lock requests

use regex::Regex;
use serde::{Deserialize, Serialize};
use nostr::{EventBuilder, Kind, Tag};
use crate::error::{CoinTossError, GameResult};
use crate::outcome::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    Create,
    Play,
}

/// JSON object embedded in a create note: `{"action":"create","side":"head"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommand {
    pub action: CommandAction,
    pub side: Side,
}

const JSON_OBJECT_PATTERN: &str = r"\{[^{}]*\}";

impl CreateCommand {
    pub fn new(side: Side) -> Self {
        Self {
            action: CommandAction::Create,
            side,
        }
    }

    /// Parse a create command from note content.
    ///
    /// The content may be bare JSON or free text embedding the JSON object.
    /// The first embedded object that parses as a command wins.
    pub fn parse(content: &str) -> GameResult<Self> {
        let objects = Regex::new(JSON_OBJECT_PATTERN)
            .map_err(|e| CoinTossError::InvalidCommand(format!("pattern error: {}", e)))?;

        let command = serde_json::from_str::<CreateCommand>(content.trim())
            .ok()
            .or_else(|| {
                objects
                    .find_iter(content)
                    .find_map(|m| serde_json::from_str::<CreateCommand>(m.as_str()).ok())
            })
            .ok_or_else(|| CoinTossError::InvalidCommand(
                "no create command object in note".to_string()
            ))?;

        command.validate()?;
        Ok(command)
    }

    pub fn validate(&self) -> GameResult<()> {
        if self.action != CommandAction::Create {
            return Err(CoinTossError::InvalidCommand(format!(
                "unsupported action: {:?}",
                self.action
            )));
        }
        Ok(())
    }

    pub fn to_content(&self) -> GameResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Kind-1 note carrying this command, tagged with `command_tag`
    pub fn to_builder(&self, command_tag: &str) -> GameResult<EventBuilder> {
        Ok(EventBuilder::new(
            Kind::TextNote,
            self.to_content()?,
            [Tag::hashtag(command_tag)],
        ))
    }
}

/// DM asking the creator to lock funds to the escrow key
pub struct LockRequest;

const LOCK_PHRASE: &str = "Lock ecash to this pubkey to proceed";
const LOCK_KEY_PATTERN: &str = r"Lock ecash to this pubkey to proceed (0[23][0-9a-fA-F]{64})\.";

impl LockRequest {
    pub fn text(side: Side, escrow_key: &str) -> String {
        format!(
            "You are about to create a new coin toss game. Your choice is {}. {} {}. Answer this DM with ecash to continue.",
            side, LOCK_PHRASE, escrow_key
        )
    }

    /// Recover the escrow key from a lock request DM
    pub fn parse_escrow_key(text: &str) -> Option<String> {
        Regex::new(LOCK_KEY_PATTERN)
            .ok()?
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
    }
}
