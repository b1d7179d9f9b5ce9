//! # Encrypted Envelope
//!
//! Versioned, recipient-targeted ciphertext container. Layout of the
//! base64 `ciphertext` field, inside the envelope:
//! `ephemeral_pubkey(32) || nonce(12) || aead_ciphertext_and_tag`.
//!
//! The key agreement is anonymous ECIES over X25519: a fresh ephemeral
//! keypair per message, HKDF-SHA256 over the raw Diffie-Hellman shared
//! secret (salted with the ephemeral public key) to derive a ChaCha20-Poly1305
//! key, following the same shape as the `age` file-encryption format.

use crate::error::{SecureError, SecureResult};
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

const ENVELOPE_VERSION: u32 = 1;
const NONCE_LEN: usize = 12;
const PUBKEY_LEN: usize = 32;
const HINT_LEN: usize = 12;

/// Recipient strings are this prefix followed by the lowercase-hex-encoded
/// X25519 public key, e.g. `agent1a1b2c3...`.
pub(crate) const RECIPIENT_PREFIX: &str = "agent1";

/// The on-wire envelope: `{"v":1,"r":"<hint>","c":"<base64>"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedPayload {
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(rename = "r")]
    pub recipient_hint: String,
    #[serde(rename = "c")]
    pub ciphertext: String,
}

fn derive_key(shared_secret: &x25519_dalek::SharedSecret, ephemeral_public: &PublicKey) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_public.as_bytes()), shared_secret.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"conductor-envelope-v1", &mut key)
        .expect("32 bytes is a valid HKDF output length");
    key
}

fn parse_recipient(recipient_public: &str) -> SecureResult<PublicKey> {
    let hex_part = recipient_public.strip_prefix(RECIPIENT_PREFIX).ok_or(SecureError::NoRecipients)?;
    if hex_part.is_empty() {
        return Err(SecureError::NoRecipients);
    }
    let bytes = hex::decode(hex_part).map_err(|_| SecureError::NoRecipients)?;
    let array: [u8; PUBKEY_LEN] = bytes.try_into().map_err(|_| SecureError::NoRecipients)?;
    Ok(PublicKey::from(array))
}

/// `recipient_hint` is the first 12 characters of the recipient public key,
/// purely advisory (never used to select a decrypting identity).
fn recipient_hint(recipient_public: &str) -> String {
    recipient_public.chars().take(HINT_LEN).collect()
}

pub fn encrypt(plaintext: &[u8], recipient_public: &str) -> SecureResult<EncryptedPayload> {
    let recipient = parse_recipient(recipient_public)?;

    let ephemeral_secret = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared_secret = ephemeral_secret.diffie_hellman(&recipient);
    let key = derive_key(&shared_secret, &ephemeral_public);

    let cipher = ChaCha20Poly1305::new((&key).into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aead_ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SecureError::CorruptPayload {
            reason: "encryption failed".into(),
        })?;

    let mut blob = Vec::with_capacity(PUBKEY_LEN + NONCE_LEN + aead_ciphertext.len());
    blob.extend_from_slice(ephemeral_public.as_bytes());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&aead_ciphertext);

    Ok(EncryptedPayload {
        version: ENVELOPE_VERSION,
        recipient_hint: recipient_hint(recipient_public),
        ciphertext: base64::engine::general_purpose::STANDARD.encode(blob),
    })
}

pub fn decrypt(payload: &EncryptedPayload, identity_secret: &StaticSecret) -> SecureResult<Vec<u8>> {
    if payload.version != ENVELOPE_VERSION {
        return Err(SecureError::VersionMismatch {
            found: payload.version,
        });
    }

    let blob = base64::engine::general_purpose::STANDARD
        .decode(&payload.ciphertext)
        .map_err(|e| SecureError::CorruptPayload {
            reason: format!("ciphertext is not valid base64: {e}"),
        })?;

    if blob.len() < PUBKEY_LEN + NONCE_LEN {
        return Err(SecureError::CorruptPayload {
            reason: "ciphertext shorter than the envelope header".into(),
        });
    }

    let (header, aead_ciphertext) = blob.split_at(PUBKEY_LEN + NONCE_LEN);
    let (ephemeral_public_bytes, nonce_bytes) = header.split_at(PUBKEY_LEN);

    let ephemeral_public_array: [u8; PUBKEY_LEN] = ephemeral_public_bytes
        .try_into()
        .expect("split_at guarantees the correct length");
    let ephemeral_public = PublicKey::from(ephemeral_public_array);

    let shared_secret = identity_secret.diffie_hellman(&ephemeral_public);
    let key = derive_key(&shared_secret, &ephemeral_public);
    let cipher = ChaCha20Poly1305::new((&key).into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, aead_ciphertext)
        .map_err(|_| SecureError::WrongRecipient)
}
