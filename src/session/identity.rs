//! Ephemeral per-session identities

use nostr::{Keys, PublicKey, SecretKey, SECP256K1};

/// Messaging identity of a session: signs every outbound event and terminates the encrypted channel
#[derive(Clone)]
pub struct GameIdentity {
    keys: Keys,
}

impl GameIdentity {
    pub fn generate() -> Self {
        Self {
            keys: Keys::generate(),
        }
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn secret_key(&self) -> &SecretKey {
        self.keys.secret_key()
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }
}

impl std::fmt::Debug for GameIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameIdentity")
            .field("public_key", &self.public_key().to_hex())
            .finish()
    }
}

/// Lock target of a session; the secret key is the settlement material revealed to the winner
#[derive(Clone)]
pub struct EscrowIdentity {
    keys: Keys,
    public_key_hex: String,
}

impl EscrowIdentity {
    pub fn generate() -> Self {
        let keys = Keys::generate();
        // Cashu P2PK locks to the full compressed point, not the x-only Nostr key
        let public_key = keys.secret_key().public_key(&SECP256K1);

        Self {
            keys,
            public_key_hex: hex::encode(public_key.serialize()),
        }
    }

    /// Compressed public key, 66 hex chars with a `02`/`03` prefix
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub fn secret_key_hex(&self) -> String {
        self.keys.secret_key().to_secret_hex()
    }
}

impl std::fmt::Debug for EscrowIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowIdentity")
            .field("public_key", &self.public_key_hex)
            .finish()
    }
}
