//! Ecash escrow verification for coin toss stakes

pub mod bundle;
pub mod decode;
pub mod verifier;

// Re-export key types
pub use bundle::{EcashProofBundle, Proof, WellKnownSecret, SecretData, P2PK_KIND};
pub use decode::{TokenDecoder, CdkTokenDecoder, extract_token, token_candidates};
pub use verifier::{EscrowVerifier, LockSummary};
