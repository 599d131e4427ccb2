//! Property-based tests for escrow arithmetic

use proptest::prelude::*;
use cointoss::escrow::{EcashProofBundle, Proof, WellKnownSecret};
use cointoss::{EscrowError, EscrowVerifier};

const LOCK_KEY: &str = "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2";
const MINT: &str = "https://mint.test";

fn bundle(amounts: &[u64], salt: &str) -> EcashProofBundle {
    let proofs = amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| Proof {
            secret: WellKnownSecret::p2pk(format!("{}{:060x}", salt, i), LOCK_KEY).to_json(),
            amount: *amount,
        })
        .collect();
    EcashProofBundle::new(MINT, "sat", proofs)
}

proptest! {
    #[test]
    fn prop_lock_total_is_sum(amounts in prop::collection::vec(1u64..1_000_000, 1..16)) {
        let summary = EscrowVerifier::verify_lock(&bundle(&amounts, "a"), LOCK_KEY).unwrap();
        prop_assert_eq!(summary.total, amounts.iter().sum::<u64>());
        prop_assert_eq!(summary.mint, MINT);
    }

    #[test]
    fn prop_match_requires_equal_totals(
        lock in prop::collection::vec(1u64..10_000, 1..8),
        join in prop::collection::vec(1u64..10_000, 1..8),
    ) {
        let summary = EscrowVerifier::verify_lock(&bundle(&lock, "a"), LOCK_KEY).unwrap();
        let result = EscrowVerifier::verify_match(&bundle(&join, "b"), &summary, LOCK_KEY);

        let join_total: u64 = join.iter().sum();
        if join_total == summary.total {
            prop_assert_eq!(result, Ok(join_total));
        } else {
            prop_assert_eq!(
                result,
                Err(EscrowError::AmountMismatch { expected: summary.total, actual: join_total })
            );
        }
    }

    #[test]
    fn prop_any_zero_proof_is_rejected(
        mut amounts in prop::collection::vec(1u64..1_000, 1..8),
        position in any::<prop::sample::Index>(),
    ) {
        let index = position.index(amounts.len());
        amounts[index] = 0;
        prop_assert_eq!(
            EscrowVerifier::verify_lock(&bundle(&amounts, "a"), LOCK_KEY),
            Err(EscrowError::InvalidAmount { index, amount: 0 })
        );
    }

    #[test]
    fn prop_range_check(amount in any::<u64>(), min in 1u64..1_000, span in 0u64..1_000_000) {
        let max = min + span;
        let in_range = amount >= min && amount <= max;
        prop_assert_eq!(EscrowVerifier::verify_range(amount, min, max).is_ok(), in_range);
    }
}
