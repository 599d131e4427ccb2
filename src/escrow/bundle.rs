//! Proof bundles and NUT-10 well-known secrets

use serde::{Deserialize, Serialize};
use crate::error::EscrowError;

/// Secret kind marking funds spendable only by the holder of a named key (NUT-11)
pub const P2PK_KIND: &str = "P2PK";

/// A single ecash proof as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Raw secret string, expected to be a JSON well-known secret
    pub secret: String,
    pub amount: u64,
}

/// Decoded ecash token: mint, unit and ordered proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcashProofBundle {
    pub mint: String,
    pub unit: String,
    pub proofs: Vec<Proof>,
}

impl EcashProofBundle {
    pub fn new(mint: impl Into<String>, unit: impl Into<String>, proofs: Vec<Proof>) -> Self {
        Self {
            mint: mint.into(),
            unit: unit.into(),
            proofs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    /// Whether any proof secret also appears in `other`
    pub fn shares_secret_with(&self, other: &EcashProofBundle) -> Option<usize> {
        self.proofs
            .iter()
            .position(|proof| other.proofs.iter().any(|o| o.secret == proof.secret))
    }
}

/// Payload of a well-known secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretData {
    pub nonce: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Vec<String>>>,
}

/// NUT-10 secret: `["<kind>", {"nonce": ..., "data": ..., "tags": ...}]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellKnownSecret(pub String, pub SecretData);

impl WellKnownSecret {
    /// Strictly parse a proof secret; any shape mismatch is a typed error
    pub fn parse(index: usize, raw: &str) -> Result<Self, EscrowError> {
        serde_json::from_str(raw).map_err(|e| EscrowError::InvalidCommitment {
            index,
            reason: format!("secret is not a well-known secret: {}", e),
        })
    }

    /// Build a P2PK secret locking to `public_key`
    pub fn p2pk(nonce: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self(
            P2PK_KIND.to_string(),
            SecretData {
                nonce: nonce.into(),
                data: public_key.into(),
                tags: None,
            },
        )
    }

    pub fn kind(&self) -> &str {
        &self.0
    }

    pub fn data(&self) -> &str {
        &self.1.data
    }

    /// NUT-11 tags, empty when absent
    pub fn tags(&self) -> &[Vec<String>] {
        self.1.tags.as_deref().unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
