//! Wire content for coin toss notes and direct messages

pub mod command;
pub mod announcement;

pub use command::{CreateCommand, CommandAction, LockRequest};
pub use announcement::{Announcement, ResultAnnouncement, SettlementReveal, OperatorNote};

/// Hashtag carried by create commands
pub const COMMAND_TAG: &str = "gamect";
/// Hashtag carried by game announcements and results
pub const GAME_TAG: &str = "cointoss";
/// Hashtag on operator re-broadcasts of open games
pub const OPERATOR_NEW_GAME_TAG: &str = "nostr-game-new";
/// Hashtag on operator notes for finished games
pub const OPERATOR_COMPLETED_TAG: &str = "nostr-game-completed";

/// Call to action in a game announcement
pub const JOIN_PROMPT: &str = "Reply to this note with your ecash token to join!";
/// Replacement call to action in operator re-broadcasts
pub const OPERATOR_JOIN_PROMPT: &str = "Click on the link below to join the game!";

/// Note viewers linked from operator re-broadcasts
pub const VIEWER_LINKS: [&str; 2] = ["https://primal.net/e/", "https://snort.social/e/"];
