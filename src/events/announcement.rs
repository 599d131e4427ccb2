//! Public announcements, results, settlement reveal and operator notes

use regex::Regex;
use serde::{Deserialize, Serialize};
use nostr::{EventBuilder, EventId, Kind, PublicKey, Tag};
use crate::error::{CoinTossError, GameResult};
use crate::outcome::Side;
use super::{GAME_TAG, JOIN_PROMPT, OPERATOR_COMPLETED_TAG, OPERATOR_JOIN_PROMPT, OPERATOR_NEW_GAME_TAG, VIEWER_LINKS};

const ANNOUNCEMENT_PATTERN: &str =
    r"\[cointoss side=(\S+) amount=(\d+) unit=(\S+) mint=(\S+) escrow=(0[23][0-9a-fA-F]{64})\]";
const RESULT_PATTERN: &str =
    r"\[cointoss-result outcome=(\S+) winner=([0-9a-fA-F]{64}) pot=(\d+) unit=([^\]\s]+)\]";

fn pattern(source: &str) -> GameResult<Regex> {
    Regex::new(source).map_err(|e| CoinTossError::Serialization {
        message: format!("pattern error: {}", e),
    })
}

fn malformed(what: &str) -> CoinTossError {
    CoinTossError::Serialization {
        message: format!("no {} line in content", what),
    }
}

/// Public note opening a game to opponents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub side: Side,
    pub amount: u64,
    pub unit: String,
    pub mint: String,
    /// Compressed escrow key the opponent must lock to
    pub escrow: String,
}

impl Announcement {
    pub fn to_content(&self) -> String {
        format!(
            "New coin toss game! {} {} locked on {}. The ecash mint is {}. Lock the same amount to {} and reply with the token. {}\n\n[cointoss side={} amount={} unit={} mint={} escrow={}]",
            self.amount, self.unit, self.side, self.mint, self.escrow, JOIN_PROMPT,
            self.side, self.amount, self.unit, self.mint, self.escrow
        )
    }

    pub fn to_builder(&self) -> EventBuilder {
        EventBuilder::new(Kind::TextNote, self.to_content(), [Tag::hashtag(GAME_TAG)])
    }

    pub fn parse(content: &str) -> GameResult<Self> {
        let caps = pattern(ANNOUNCEMENT_PATTERN)?
            .captures(content)
            .ok_or_else(|| malformed("announcement"))?;

        let amount = caps[2].parse::<u64>().map_err(|e| CoinTossError::Serialization {
            message: format!("invalid amount: {}", e),
        })?;

        Ok(Self {
            side: caps[1].parse()?,
            amount,
            unit: caps[3].to_string(),
            mint: caps[4].to_string(),
            escrow: caps[5].to_lowercase(),
        })
    }
}

/// Public note naming the outcome and the winner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAnnouncement {
    pub outcome: Side,
    pub winner: PublicKey,
    pub pot: u64,
    pub unit: String,
}

impl ResultAnnouncement {
    pub fn to_content(&self) -> String {
        let winner = self.winner.to_hex();
        format!(
            "The coin landed on {}! {} wins the pot of {} {}.\n\n[cointoss-result outcome={} winner={} pot={} unit={}]",
            self.outcome, winner, self.pot, self.unit,
            self.outcome, winner, self.pot, self.unit
        )
    }

    /// Result note referencing the announcement and the winner
    pub fn to_builder(&self, announcement_id: EventId) -> EventBuilder {
        EventBuilder::new(
            Kind::TextNote,
            self.to_content(),
            [
                Tag::event(announcement_id),
                Tag::public_key(self.winner),
                Tag::hashtag(GAME_TAG),
            ],
        )
    }

    pub fn parse(content: &str) -> GameResult<Self> {
        let caps = pattern(RESULT_PATTERN)?
            .captures(content)
            .ok_or_else(|| malformed("result"))?;

        let winner = PublicKey::from_hex(&caps[2]).map_err(|e| CoinTossError::Nostr(e.to_string()))?;
        let pot = caps[3].parse::<u64>().map_err(|e| CoinTossError::Serialization {
            message: format!("invalid pot: {}", e),
        })?;

        Ok(Self {
            outcome: caps[1].parse()?,
            winner,
            pot,
            unit: caps[4].to_string(),
        })
    }
}

/// Settlement material sent to the winner only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReveal {
    pub escrow_secret_key: String,
    pub lock_token: String,
    pub join_token: String,
}

const REVEAL_KEY_PREFIX: &str = "Redeem the pot with this secret key: ";
const REVEAL_LOCK_PREFIX: &str = "Creator token: ";
const REVEAL_JOIN_PREFIX: &str = "Opponent token: ";

impl SettlementReveal {
    pub fn to_text(&self) -> String {
        format!(
            "You won the coin toss! {}{}\n\n{}{}\n\n{}{}",
            REVEAL_KEY_PREFIX, self.escrow_secret_key,
            REVEAL_LOCK_PREFIX, self.lock_token,
            REVEAL_JOIN_PREFIX, self.join_token
        )
    }

    pub fn parse(text: &str) -> GameResult<Self> {
        let field = |prefix: &str| -> GameResult<String> {
            text.lines()
                .find_map(|line| line.split_once(prefix).map(|(_, rest)| rest.trim().to_string()))
                .filter(|value| !value.is_empty())
                .ok_or_else(|| malformed(prefix.trim_end_matches(": ")))
        };

        Ok(Self {
            escrow_secret_key: field(REVEAL_KEY_PREFIX)?,
            lock_token: field(REVEAL_LOCK_PREFIX)?,
            join_token: field(REVEAL_JOIN_PREFIX)?,
        })
    }
}

/// Notes published by the operator identity
pub struct OperatorNote;

impl OperatorNote {
    /// Re-broadcast an open game with viewer links
    pub fn rebroadcast(announcement_content: &str, announcement_id: EventId) -> EventBuilder {
        let text = announcement_content.replace(JOIN_PROMPT, OPERATOR_JOIN_PROMPT);
        let links: Vec<String> = VIEWER_LINKS
            .iter()
            .map(|base| format!("{}{}", base, announcement_id.to_hex()))
            .collect();

        EventBuilder::new(
            Kind::TextNote,
            format!("{}\n\n{}", text, links.join("\n\n")),
            [Tag::hashtag(OPERATOR_NEW_GAME_TAG)],
        )
    }

    /// Completion note for a resolved game
    pub fn completed(result: &ResultAnnouncement, announcement_id: EventId) -> EventBuilder {
        EventBuilder::new(
            Kind::TextNote,
            format!(
                "Coin toss game completed. {}\n\nhttps://primal.net/e/{}",
                result.to_content(),
                announcement_id.to_hex()
            ),
            [Tag::event(announcement_id), Tag::hashtag(OPERATOR_COMPLETED_TAG)],
        )
    }
}
