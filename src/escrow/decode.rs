//! Ecash token decoding boundary

use std::str::FromStr;
use cdk::nuts::Token;
use crate::error::EscrowError;
use super::bundle::{EcashProofBundle, Proof};

/// Unit assumed when a token does not name one
pub const DEFAULT_UNIT: &str = "sat";

/// Decodes a serialized ecash token into a proof bundle
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<EcashProofBundle, EscrowError>;

    /// Decode the first token candidate in free text that decodes, returning it with its bundle
    fn decode_from_text<'a>(&self, content: &'a str) -> Result<(&'a str, EcashProofBundle), EscrowError> {
        let mut last_error = None;
        for candidate in token_candidates(content) {
            match self.decode(candidate) {
                Ok(bundle) => return Ok((candidate, bundle)),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| EscrowError::Decode("no token in message".to_string())))
    }
}

/// Token decoder backed by `cdk`, accepting `cashuA` and `cashuB` tokens
#[derive(Debug, Clone, Default)]
pub struct CdkTokenDecoder;

impl TokenDecoder for CdkTokenDecoder {
    fn decode(&self, token: &str) -> Result<EcashProofBundle, EscrowError> {
        let token = Token::from_str(token.trim())
            .map_err(|e| EscrowError::Decode(e.to_string()))?;

        let mint = token
            .mint_url()
            .map_err(|e| EscrowError::Decode(e.to_string()))?
            .to_string();

        let unit = token
            .unit()
            .clone()
            .map(|u| u.to_string())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());

        let proofs = token
            .proofs()
            .into_iter()
            .map(|proof| Proof {
                secret: proof.secret.to_string(),
                amount: u64::from(proof.amount),
            })
            .collect();

        Ok(EcashProofBundle { mint, unit, proofs })
    }
}

/// Serialized tokens are `cashu`, an uppercase version letter, then the payload
const TOKEN_PREFIX: &str = "cashu";

fn looks_like_token(word: &str) -> bool {
    word.strip_prefix(TOKEN_PREFIX)
        .and_then(|rest| rest.chars().next())
        .map(|version| version.is_ascii_uppercase())
        .unwrap_or(false)
}

/// Words in free text shaped like serialized tokens, in order. Falls back to
/// the whole trimmed text when none is found.
pub fn token_candidates(content: &str) -> Vec<&str> {
    let words: Vec<&str> = content.split_whitespace().filter(|w| looks_like_token(w)).collect();
    if words.is_empty() {
        vec![content.trim()]
    } else {
        words
    }
}

/// First token-shaped word in free text, or the whole trimmed text
pub fn extract_token(content: &str) -> &str {
    token_candidates(content)
        .into_iter()
        .next()
        .unwrap_or_else(|| content.trim())
}
