//! Cryptographic primitives for the pairing handshake
//!
//! Everything here is stateless and safe to call from any task.

mod aes;
mod encoding;
mod error;
mod hash;
mod random;
mod rsa;
#[cfg(test)]
mod tests;

pub use self::aes::{Aes128Ecb, aes128_ecb_decrypt, aes128_ecb_encrypt};
pub use self::encoding::{concat, hex_decode, hex_encode};
pub use self::error::CryptoError;
pub use self::hash::{constant_time_eq, derive_key, sha256, sha256_concat};
pub use self::random::{random_array, random_bytes};
pub use self::rsa::{RsaKeyPair, RsaPublicKey, sizes as rsa_sizes};

/// Length of various cryptographic values
pub mod lengths {
    /// AES-128 key length
    pub const AES_128_KEY: usize = 16;
    /// AES block length
    pub const AES_BLOCK: usize = 16;
    /// SHA-256 digest length
    pub const SHA256_DIGEST: usize = 32;
    /// Salt mixed with the PIN
    pub const SALT: usize = 16;
    /// Client and server challenges
    pub const CHALLENGE: usize = 16;
    /// Client and server pairing secrets
    pub const SECRET: usize = 16;
}
