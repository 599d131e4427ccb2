//! Escrow checks on tokens issued by the mock mint

use cointoss::escrow::{extract_token, TokenDecoder, WellKnownSecret};
use cointoss::session::EscrowIdentity;
use cointoss::{EscrowError, EscrowVerifier};
use crate::mocks::{MockMint, MockTokenDecoder, MINT_URL};

#[test]
fn test_lock_then_match_for_fresh_escrow_identity() {
    let mint = MockMint::new(MINT_URL);
    let escrow = EscrowIdentity::generate();

    let lock = MockTokenDecoder
        .decode(&mint.lock_token(escrow.public_key_hex(), &[64, 32, 4]))
        .unwrap();
    let summary = EscrowVerifier::verify_lock(&lock, escrow.public_key_hex()).unwrap();
    assert_eq!(summary.total, 100);

    let join = MockTokenDecoder
        .decode(&mint.lock_token(escrow.public_key_hex(), &[50, 50]))
        .unwrap();
    assert_eq!(EscrowVerifier::verify_match(&join, &summary, escrow.public_key_hex()), Ok(100));
    assert_eq!(join.shares_secret_with(&lock), None);
}

#[test]
fn test_uppercase_key_in_commitment_is_accepted() {
    let mint = MockMint::new(MINT_URL);
    let escrow = EscrowIdentity::generate();
    let bundle = mint.lock_bundle(&escrow.public_key_hex().to_uppercase(), &[8]);

    assert!(EscrowVerifier::verify_lock(&bundle, escrow.public_key_hex()).is_ok());
}

#[test]
fn test_stake_for_another_session_is_rejected() {
    let mint = MockMint::new(MINT_URL);
    let ours = EscrowIdentity::generate();
    let theirs = EscrowIdentity::generate();
    let bundle = mint.lock_bundle(theirs.public_key_hex(), &[10]);

    assert!(matches!(
        EscrowVerifier::verify_lock(&bundle, ours.public_key_hex()),
        Err(EscrowError::InvalidCommitment { index: 0, .. })
    ));
}

#[test]
fn test_unlocked_and_mixed_bundles_are_rejected() {
    let mint = MockMint::new(MINT_URL);
    let escrow = EscrowIdentity::generate();

    let plain = MockTokenDecoder.decode(&mint.plain_token(&[10])).unwrap();
    assert!(matches!(
        EscrowVerifier::verify_lock(&plain, escrow.public_key_hex()),
        Err(EscrowError::InvalidCommitment { index: 0, .. })
    ));

    let mut mixed = mint.lock_bundle(escrow.public_key_hex(), &[4, 4]);
    mixed.proofs[1].secret = WellKnownSecret::p2pk("ff", "not-a-key").to_json();
    assert!(matches!(
        EscrowVerifier::verify_lock(&mixed, escrow.public_key_hex()),
        Err(EscrowError::InvalidCommitment { index: 1, .. })
    ));
}

#[test]
fn test_replayed_lock_is_detected() {
    let mint = MockMint::new(MINT_URL);
    let escrow = EscrowIdentity::generate();
    let lock = mint.lock_bundle(escrow.public_key_hex(), &[30, 70]);

    let mut replay = mint.lock_bundle(escrow.public_key_hex(), &[30, 70]);
    replay.proofs[1] = lock.proofs[1].clone();
    assert_eq!(replay.shares_secret_with(&lock), Some(1));
}

#[test]
fn test_token_extracted_from_reply_text() {
    let mint = MockMint::new(MINT_URL);
    let escrow = EscrowIdentity::generate();
    let token = mint.lock_token(escrow.public_key_hex(), &[100]);
    let reply = format!("count me in!\n{} good luck", token);

    let bundle = MockTokenDecoder.decode(extract_token(&reply)).unwrap();
    assert_eq!(bundle.mint, MINT_URL);
    assert_eq!(bundle.proofs.len(), 1);
}
