//! Invalid stakes and commands that must not advance a session

use nostr::{EventBuilder, Keys, Kind, Tag};
use cointoss::escrow::WellKnownSecret;
use cointoss::events::LockRequest;
use cointoss::{CoinTossError, GameRegistry, InboundMessage, SessionId, SessionState, Side};
use crate::mocks::{test_config, Harness, MockMint, MockRelay, MockTokenDecoder, Player};
use std::sync::Arc;

#[tokio::test]
async fn test_short_join_is_rejected_then_valid_join_accepted() {
    let harness = Harness::start(test_config(), Side::Heads).await;
    let creator = Player::new();
    let short = Player::new();
    let full = Player::new();

    let game = harness.open_game(&creator, Side::Heads, &[100]).await;

    let short_token = harness.mint.lock_token(&game.escrow_key, &[50]);
    short.reply(&harness.relay, game.announcement.id, &short_token).await;

    let session = harness.wait_for_state(&game.session_id, SessionState::Open).await;
    assert!(session.join().is_none());

    let full_token = harness.mint.lock_token(&game.escrow_key, &[100]);
    full.reply(&harness.relay, game.announcement.id, &full_token).await;

    let session = harness.wait_for_state(&game.session_id, SessionState::Closed).await;
    assert_eq!(session.opponent(), Some(full.public_key()));
    assert_eq!(session.join().map(|j| j.amount), Some(100));

    harness.stop().await;
}

#[tokio::test]
async fn test_repeated_or_refundable_proofs_do_not_count_as_stake() {
    let harness = Harness::start(test_config(), Side::Tails).await;
    let creator = Player::new();
    let cheat = Player::new();
    let opponent = Player::new();

    let game = harness.open_game(&creator, Side::Heads, &[100]).await;

    // One 50-unit proof listed twice
    let mut doubled = harness.mint.lock_bundle(&game.escrow_key, &[50]);
    doubled.proofs.push(doubled.proofs[0].clone());
    cheat
        .reply(&harness.relay, game.announcement.id, &MockMint::encode(&doubled))
        .await;

    // Full amount, but reclaimable by its sender
    let mut refundable = harness.mint.lock_bundle(&game.escrow_key, &[100]);
    let mut secret = WellKnownSecret::parse(0, &refundable.proofs[0].secret).unwrap();
    secret.1.tags = Some(vec![
        vec!["locktime".to_string(), "1".to_string()],
        vec!["refund".to_string(), cheat.public_key().to_hex()],
    ]);
    refundable.proofs[0].secret = secret.to_json();
    cheat
        .reply(&harness.relay, game.announcement.id, &MockMint::encode(&refundable))
        .await;

    let valid = harness.mint.lock_token(&game.escrow_key, &[100]);
    opponent.reply(&harness.relay, game.announcement.id, &valid).await;

    let session = harness.wait_for_state(&game.session_id, SessionState::Closed).await;
    assert_eq!(session.opponent(), Some(opponent.public_key()));
    assert_eq!(session.winner(), Some(opponent.public_key()));
    assert_eq!(session.join().map(|j| j.token.clone()), Some(valid));
    assert!(cheat.inbox(&harness.relay).is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn test_invalid_joins_leave_session_open() {
    let harness = Harness::start(test_config(), Side::Tails).await;
    let creator = Player::new();
    let attacker = Player::new();
    let opponent = Player::new();

    let game = harness.open_game(&creator, Side::Heads, &[100]).await;
    let other_mint = MockMint::new("https://other.mint");

    // Wrong mint, replayed creator token, unlocked proofs, creator self-join, garbage
    let attempts = [
        other_mint.lock_token(&game.escrow_key, &[100]),
        game.lock_token.clone(),
        harness.mint.plain_token(&[100]),
        "cashuMocknothex".to_string(),
        "no token here".to_string(),
    ];
    for content in &attempts {
        attacker.reply(&harness.relay, game.announcement.id, content).await;
    }
    creator
        .reply(&harness.relay, game.announcement.id, &harness.mint.lock_token(&game.escrow_key, &[100]))
        .await;

    let valid = harness.mint.lock_token(&game.escrow_key, &[100]);
    opponent.reply(&harness.relay, game.announcement.id, &valid).await;

    // Replies are consumed in order, so every invalid one was seen first
    let session = harness.wait_for_state(&game.session_id, SessionState::Closed).await;
    assert_eq!(session.opponent(), Some(opponent.public_key()));
    assert_eq!(session.join().map(|j| j.token.clone()), Some(valid));
    assert_eq!(session.winner(), Some(opponent.public_key()));

    // The creator's token only ever travels in the winner's private DM
    let public_notes = harness.relay.notes_by(game.game_key);
    assert!(public_notes.iter().all(|e| !e.content.contains(&game.lock_token)));

    harness.stop().await;
}

#[tokio::test]
async fn test_invalid_locks_are_skipped() {
    let mut config = test_config();
    config.game.max_token_amount = 1_000;
    let harness = Harness::start(config, Side::Heads).await;
    let creator = Player::new();

    let origin = creator.create_game(&harness.relay, Side::Tails).await;
    let request = creator
        .await_dm(&harness.relay, |text| LockRequest::parse_escrow_key(text).is_some())
        .await
        .expect("lock request DM");
    let escrow_key = LockRequest::parse_escrow_key(&request.text).unwrap();
    let stranger_key = Keys::generate();
    let stranger_escrow = format!("02{}", stranger_key.public_key().to_hex());

    let too_large = harness.mint.lock_token(&escrow_key, &[1_001]);
    let wrong_target = harness.mint.lock_token(&stranger_escrow, &[100]);
    let valid = harness.mint.lock_token(&escrow_key, &[60, 40]);
    creator.send_dm(&harness.relay, request.sender, &too_large).await;
    creator.send_dm(&harness.relay, request.sender, &wrong_target).await;
    creator.send_dm(&harness.relay, request.sender, &valid).await;

    let session = harness.wait_for_state(&SessionId::from(origin), SessionState::Open).await;
    let lock = session.lock().expect("lock recorded");
    assert_eq!(lock.amount, 100);
    assert_eq!(lock.token, valid);
    assert_eq!(lock.mint, harness.mint.url());

    harness.stop().await;
}

fn note(keys: &Keys, content: &str) -> InboundMessage {
    let event = EventBuilder::new(Kind::TextNote, content, [Tag::hashtag("gamect")])
        .to_event(keys)
        .unwrap();
    InboundMessage::from_event(&event)
}

fn registry(config: cointoss::CoinTossConfig) -> GameRegistry {
    GameRegistry::new(config, Arc::new(MockRelay::new()), Arc::new(MockTokenDecoder)).unwrap()
}

#[tokio::test]
async fn test_malformed_create_commands_start_nothing() {
    let registry = registry(test_config());
    let keys = Keys::generate();

    for content in [
        "let's flip a coin",
        r#"{"action":"play","side":"head"}"#,
        r#"{"action":"create","side":"edge"}"#,
        r#"{"action":"create"}"#,
    ] {
        let result = registry.handle_create_command(&note(&keys, content)).await;
        assert!(matches!(result, Err(CoinTossError::InvalidCommand(_))), "{}", content);
    }

    let dm = EventBuilder::new(Kind::EncryptedDirectMessage, r#"{"action":"create","side":"head"}"#, Vec::<Tag>::new())
        .to_event(&keys)
        .unwrap();
    let result = registry.handle_create_command(&InboundMessage::from_event(&dm)).await;
    assert!(matches!(result, Err(CoinTossError::InvalidCommand(_))));

    assert!(registry.session_ids().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_create_is_rejected() {
    let registry = registry(test_config());
    let keys = Keys::generate();
    let message = note(&keys, r#"gm {"action":"create","side":"tail"}"#);

    let id = registry.handle_create_command(&message).await.unwrap();
    assert_eq!(id, SessionId::from(message.id));

    let again = registry.handle_create_command(&message).await;
    assert!(matches!(again, Err(CoinTossError::DuplicateSession(_))));
    assert_eq!(registry.session_ids().await.len(), 1);

    let session = registry.lookup(&id).await.unwrap();
    assert_eq!(session.creator(), keys.public_key());
    assert_eq!(session.chosen_side(), Side::Tails);

    registry.remove(&id).await;
}

#[tokio::test]
async fn test_capacity_is_enforced() {
    let mut config = test_config();
    config.game.max_concurrent_games = 1;
    let registry = registry(config);
    let keys = Keys::generate();

    let first = registry
        .handle_create_command(&note(&keys, r#"{"action":"create","side":"head"}"#))
        .await
        .unwrap();
    let second = registry
        .handle_create_command(&note(&keys, r#"{"action":"create","side":"tail"} again"#))
        .await;
    assert!(matches!(second, Err(CoinTossError::RegistryFull { limit: 1 })));

    // Capacity frees up once the first session is gone
    registry.remove(&first).await;
    assert!(registry
        .handle_create_command(&note(&keys, r#"{"action":"create","side":"tail"} third"#))
        .await
        .is_ok());
}
