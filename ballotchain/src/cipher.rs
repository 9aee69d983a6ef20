//! Vote confidentiality under a poll key.
//!
//! A choice is XORed with a 32-byte PBKDF2 key derived from `SHA-256(public_key)` and a
//! fresh per-vote salt, repeated over the plaintext. The key depends only on the public key
//! and the salt:
//! decryption recomputes the public key from the secret key and proceeds from there, so
//! anyone holding the public key can decrypt an observed envelope. No authentication tag
//! is carried; a corrupted ciphertext that still decodes as UTF-8 yields garbage.

use crate::*;
use rand::rngs::OsRng;
use rand::{thread_rng, Rng};

/// Salt length in bytes
pub const SALT_LENGTH: usize = 16;

/// Derived key length in bytes; longer plaintexts reuse the key cyclically
pub const KEY_LENGTH: usize = 32;

/// Secret and public value for a single poll.
///
/// The poll owns this; only the public key is handed to voters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PollKeyPair {
    pub secret_key: String,
    pub public_key: String,
}

impl PollKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let secret: [u8; 32] = csprng.gen();
        Self::from_secret(&hex::encode(secret))
    }

    /// Rebuild a key pair from its secret key
    pub fn from_secret(secret_key: &str) -> Self {
        PollKeyPair {
            secret_key: secret_key.to_owned(),
            public_key: public_key_for(secret_key),
        }
    }
}

/// The public value for a secret key: `hex(SHA-256(secret_key))`
pub fn public_key_for(secret_key: &str) -> String {
    sha256_hex(secret_key.as_bytes())
}

/// Transport form of an encrypted vote
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Envelope {
    #[serde(with = "serde_b64")]
    pub salt: Vec<u8>,

    #[serde(with = "serde_b64")]
    pub ciphertext: Vec<u8>,

    /// Plaintext length in bytes
    pub length: usize,
}

impl Envelope {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ballotchain: Unexpected error serializing envelope")
    }

    pub fn from_json(json: &str) -> Result<Self, DecryptionError> {
        serde_json::from_str(json).map_err(|e| DecryptionError::MalformedEnvelope(e.to_string()))
    }
}

/// Encrypt a vote choice under a poll's public key, with a fresh random salt.
pub fn encrypt_vote(choice: &str, public_key: &str) -> Envelope {
    let mut salt = [0u8; SALT_LENGTH];
    thread_rng().fill(&mut salt);
    encrypt_vote_with_salt(choice, public_key, &salt)
}

/// Encrypt a vote choice with a caller-supplied salt. Deterministic.
pub fn encrypt_vote_with_salt(choice: &str, public_key: &str, salt: &[u8]) -> Envelope {
    let plaintext = choice.as_bytes();
    let key = derive_key(public_key, salt);

    Envelope {
        salt: salt.to_vec(),
        ciphertext: xor(plaintext, &key),
        length: plaintext.len(),
    }
}

/// Decrypt an envelope with the poll's secret key.
pub fn decrypt_vote(envelope: &Envelope, secret_key: &str) -> Result<String, DecryptionError> {
    if envelope.length > envelope.ciphertext.len() {
        return Err(DecryptionError::LengthOutOfRange {
            length: envelope.length,
            available: envelope.ciphertext.len(),
        });
    }

    let key = derive_key(&public_key_for(secret_key), &envelope.salt);
    let plaintext = xor(&envelope.ciphertext[..envelope.length], &key);

    String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8)
}

fn derive_key(public_key: &str, salt: &[u8]) -> [u8; KEY_LENGTH] {
    let key_material = sha256(public_key.as_bytes());
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_sha256(&key_material, salt, KDF_ROUNDS, &mut key);
    key
}

fn xor(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter().zip(key.iter().cycle()).map(|(a, b)| a ^ b).collect()
}
