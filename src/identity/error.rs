use thiserror::Error;

use crate::protocol::crypto::CryptoError;

/// Identity persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage not available")]
    NotAvailable,
}

/// Errors producing or using the client identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[source] CryptoError),

    #[error("certificate generation failed: {0}")]
    Certificate(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("stored identity is unreadable: {0}")]
    Corrupt(String),

    #[error("identity storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("identity task failed: {0}")]
    Task(String),
}
