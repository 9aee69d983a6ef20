use digest::Digest;
use hmac::Hmac;
use serde::Serialize;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Iteration count for the vote keystream KDF
pub const KDF_ROUNDS: u32 = 100_000;

/// SHA-256 of `data`
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// PBKDF2-HMAC-SHA256, filling `out` completely.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, rounds, out);
}

/// Canonical bytes of a record, used for hashing and signing.
///
/// Callers pass a dedicated borrowed struct whose fields are declared in lexicographic
/// order, so the bytes never depend on how the record is persisted.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_cbor::to_vec(value).expect("ballotchain: Unexpected error serializing record")
}

/// Wall-clock seconds since the unix epoch
pub fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hex::encode(sha256(b"abc")), sha256_hex(b"abc"));
    }

    #[test]
    fn test_pbkdf2_prefix_is_stable() {
        // PBKDF2 output blocks are independent, so a longer output extends a shorter one.
        let mut short = [0u8; 16];
        let mut long = [0u8; 48];
        pbkdf2_sha256(b"password", b"salt", 2, &mut short);
        pbkdf2_sha256(b"password", b"salt", 2, &mut long);
        assert_eq!(short[..], long[..16]);
        assert_eq!(
            hex::encode(&long[..32]),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
    }
}
