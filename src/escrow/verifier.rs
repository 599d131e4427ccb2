//! Verification of P2PK lock proofs against a session's escrow key

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::error::EscrowError;
use super::bundle::{EcashProofBundle, WellKnownSecret, P2PK_KIND};

/// The only NUT-11 tag allowed on an escrow proof. Every other tag (extra
/// signers, signature thresholds, locktime, refund keys) moves spending power
/// away from the escrow key.
pub const ALLOWED_TAGS: [&str; 1] = ["sigflag"];

/// Outcome of a successful lock verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSummary {
    pub total: u64,
    pub mint: String,
    pub unit: String,
}

/// Stateless verifier for escrow proof bundles
pub struct EscrowVerifier;

impl EscrowVerifier {
    /// Verify that every proof is P2PK-locked to `expected_lock_key` and sum the amounts
    pub fn verify_lock(
        bundle: &EcashProofBundle,
        expected_lock_key: &str,
    ) -> Result<LockSummary, EscrowError> {
        if bundle.is_empty() {
            return Err(EscrowError::EmptyBundle);
        }

        let mut total: u64 = 0;
        let mut seen = HashSet::with_capacity(bundle.proofs.len());
        for (index, proof) in bundle.proofs.iter().enumerate() {
            // The mint redeems a secret once, so a repeat adds no value
            if !seen.insert(proof.secret.as_str()) {
                return Err(EscrowError::DuplicateProof { index });
            }

            Self::verify_commitment(index, &proof.secret, expected_lock_key)?;

            if proof.amount == 0 {
                return Err(EscrowError::InvalidAmount {
                    index,
                    amount: proof.amount,
                });
            }

            total = total.checked_add(proof.amount).ok_or(EscrowError::InvalidAmount {
                index,
                amount: proof.amount,
            })?;
        }

        Ok(LockSummary {
            total,
            mint: bundle.mint.clone(),
            unit: bundle.unit.clone(),
        })
    }

    /// Verify a joining bundle against the creator's lock: same key, total, mint and unit
    pub fn verify_match(
        bundle: &EcashProofBundle,
        prior: &LockSummary,
        expected_lock_key: &str,
    ) -> Result<u64, EscrowError> {
        let summary = Self::verify_lock(bundle, expected_lock_key)?;

        if summary.total != prior.total {
            return Err(EscrowError::AmountMismatch {
                expected: prior.total,
                actual: summary.total,
            });
        }

        if summary.mint != prior.mint {
            return Err(EscrowError::MintMismatch {
                expected: prior.mint.clone(),
                actual: summary.mint,
            });
        }

        if summary.unit != prior.unit {
            return Err(EscrowError::UnitMismatch {
                expected: prior.unit.clone(),
                actual: summary.unit,
            });
        }

        Ok(summary.total)
    }

    /// Reject amounts outside the operator's allowed range
    pub fn verify_range(amount: u64, min: u64, max: u64) -> Result<(), EscrowError> {
        if amount < min || amount > max {
            return Err(EscrowError::AmountOutOfRange { amount, min, max });
        }
        Ok(())
    }

    fn verify_commitment(index: usize, raw_secret: &str, expected_lock_key: &str) -> Result<(), EscrowError> {
        let secret = WellKnownSecret::parse(index, raw_secret)?;

        if secret.kind() != P2PK_KIND {
            return Err(EscrowError::InvalidCommitment {
                index,
                reason: format!("expected {} secret, got {}", P2PK_KIND, secret.kind()),
            });
        }

        if !secret.data().eq_ignore_ascii_case(expected_lock_key) {
            return Err(EscrowError::InvalidCommitment {
                index,
                reason: "proof is locked to a different key".to_string(),
            });
        }

        for tag in secret.tags() {
            match tag.first().map(String::as_str) {
                Some(name) if ALLOWED_TAGS.contains(&name) => {}
                Some(name) => {
                    return Err(EscrowError::InvalidCommitment {
                        index,
                        reason: format!("tag {} weakens the escrow lock", name),
                    })
                }
                None => {
                    return Err(EscrowError::InvalidCommitment {
                        index,
                        reason: "empty tag".to_string(),
                    })
                }
            }
        }

        Ok(())
    }
}
