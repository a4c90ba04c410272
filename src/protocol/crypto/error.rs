use thiserror::Error;

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("input length {0} is not a multiple of the AES block size")]
    UnalignedInput(usize),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("key encoding failed: {0}")]
    EncodingFailed(String),
}
