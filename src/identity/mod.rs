//! Durable client identity: RSA-2048 key pair and self-signed certificate

mod certificate;
mod error;
mod storage;
mod store;
#[cfg(test)]
mod tests;

pub use certificate::{CLIENT_CERT_SUBJECT, ParsedCertificate, generate_certificate};
pub use error::{IdentityError, StorageError};
pub use storage::{FileStorage, IdentityRecord, IdentityStorage, MemoryStorage};
pub use store::{ClientIdentity, IdentityStore, generate_unique_id};
