//! Point-to-point encrypted channel for direct messages
//!
//! Shared secrets come from secp256k1 ECDH between a session's game key and
//! the counterparty's Nostr key. Payloads are AES-256-CBC encrypted with
//! PKCS#7 padding and carried on the wire as `<base64 ciphertext>?iv=<base64 iv>`.

use std::fmt;
use std::str::FromStr;
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use nostr::secp256k1::{ecdh, Parity, XOnlyPublicKey};
use nostr::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use crate::error::ChannelError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const IV_DELIMITER: &str = "?iv=";
pub const IV_LEN: usize = 16;
pub const SECRET_LEN: usize = 32;

/// Encrypted payload as carried in a direct message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Base64 ciphertext
    pub ciphertext: String,
    /// Base64 initialization vector
    pub iv: String,
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ciphertext, IV_DELIMITER, self.iv)
    }
}

impl FromStr for Envelope {
    type Err = ChannelError;

    fn from_str(wire: &str) -> Result<Self, Self::Err> {
        let (ciphertext, iv) = wire.trim().split_once(IV_DELIMITER).ok_or_else(|| {
            ChannelError::MalformedEnvelope("missing ?iv= delimiter".to_string())
        })?;

        if ciphertext.is_empty() || iv.is_empty() {
            return Err(ChannelError::MalformedEnvelope(
                "empty ciphertext or iv".to_string(),
            ));
        }

        Ok(Self {
            ciphertext: ciphertext.to_string(),
            iv: iv.to_string(),
        })
    }
}

/// Derive the 32-byte shared secret between a local secret key and a remote Nostr public key.
///
/// The remote x-only key is lifted with even parity and the X coordinate of
/// the ECDH point is returned, so both sides derive the same value.
pub fn derive_shared_secret(
    local_secret_key: &SecretKey,
    remote_public_key: &PublicKey,
) -> Result<[u8; SECRET_LEN], ChannelError> {
    let xonly = XOnlyPublicKey::from_str(&remote_public_key.to_hex())
        .map_err(|e| ChannelError::CryptoError(format!("invalid remote key: {}", e)))?;
    let point = nostr::secp256k1::PublicKey::from_x_only_public_key(xonly, Parity::Even);

    let shared_point = ecdh::shared_secret_point(&point, local_secret_key);

    let mut secret = [0u8; SECRET_LEN];
    secret.copy_from_slice(&shared_point[..SECRET_LEN]);
    Ok(secret)
}

/// Encrypt `plaintext` under `secret` with a fresh random IV
pub fn encrypt(plaintext: &str, secret: &[u8]) -> Result<Envelope, ChannelError> {
    if secret.len() != SECRET_LEN {
        return Err(ChannelError::CryptoError(format!(
            "secret must be {} bytes, got {}",
            SECRET_LEN,
            secret.len()
        )));
    }

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(secret, &iv)
        .map_err(|e| ChannelError::CryptoError(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(Envelope {
        ciphertext: STANDARD.encode(ciphertext),
        iv: STANDARD.encode(iv),
    })
}

/// Decrypt a wire envelope under `secret`
pub fn decrypt(wire: &str, secret: &[u8]) -> Result<String, ChannelError> {
    let envelope = Envelope::from_str(wire)?;
    decrypt_envelope(&envelope, secret)
}

pub fn decrypt_envelope(envelope: &Envelope, secret: &[u8]) -> Result<String, ChannelError> {
    if secret.len() != SECRET_LEN {
        return Err(ChannelError::CryptoError(format!(
            "secret must be {} bytes, got {}",
            SECRET_LEN,
            secret.len()
        )));
    }

    let ciphertext = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|e| ChannelError::MalformedEnvelope(format!("ciphertext: {}", e)))?;
    let iv = STANDARD
        .decode(&envelope.iv)
        .map_err(|e| ChannelError::MalformedEnvelope(format!("iv: {}", e)))?;

    if iv.len() != IV_LEN {
        return Err(ChannelError::MalformedEnvelope(format!(
            "iv must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(secret, &iv)
        .map_err(|e| ChannelError::CryptoError(e.to_string()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| ChannelError::DecryptionError("bad padding".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| ChannelError::DecryptionError("plaintext is not UTF-8".to_string()))
}

/// Encrypt a direct message from `local_secret_key` to `remote_public_key`
pub fn seal(
    plaintext: &str,
    local_secret_key: &SecretKey,
    remote_public_key: &PublicKey,
) -> Result<String, ChannelError> {
    let secret = derive_shared_secret(local_secret_key, remote_public_key)?;
    Ok(encrypt(plaintext, &secret)?.to_string())
}

/// Decrypt a direct message sent by `remote_public_key` to `local_secret_key`
pub fn open(
    wire: &str,
    local_secret_key: &SecretKey,
    remote_public_key: &PublicKey,
) -> Result<String, ChannelError> {
    let secret = derive_shared_secret(local_secret_key, remote_public_key)?;
    decrypt(wire, &secret)
}
