use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::lengths;

/// SHA-256 of a single buffer
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; lengths::SHA256_DIGEST] {
    Sha256::digest(data).into()
}

/// SHA-256 over several buffers, hashed as if concatenated
#[must_use]
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; lengths::SHA256_DIGEST] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derive the 16-byte session key used for the whole handshake.
///
/// `SHA256(salt || pin)`, truncated to the AES-128 key size.
#[must_use]
pub fn derive_key(salt: &[u8], pin: &str) -> [u8; lengths::AES_128_KEY] {
    let digest = sha256_concat(&[salt, pin.as_bytes()]);
    let mut key = [0u8; lengths::AES_128_KEY];
    key.copy_from_slice(&digest[..lengths::AES_128_KEY]);
    key
}

/// Compare two byte strings without leaking where they differ
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_concat_matches_single_buffer() {
        let joined = sha256(b"hello world");
        let parts = sha256_concat(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_derive_key_is_prefix_of_salted_hash() {
        let salt = [0xAAu8; 16];
        let key = derive_key(&salt, "1234");

        let mut input = salt.to_vec();
        input.extend_from_slice(b"1234");
        assert_eq!(key, sha256(&input)[..16]);
    }

    #[test]
    fn test_derive_key_depends_on_pin_and_salt() {
        let salt = [0x01u8; 16];
        assert_ne!(derive_key(&salt, "1234"), derive_key(&salt, "1235"));
        assert_ne!(derive_key(&salt, "1234"), derive_key(&[0x02u8; 16], "1234"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"diff"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
