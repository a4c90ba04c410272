//! Storage for the client identity

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use zeroize::Zeroize;

use super::StorageError;

/// Persisted form of a client identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Client identifier sent as `uniqueid`
    pub unique_id: String,
    /// PKCS#8 PEM private key
    pub private_key_pem: String,
    /// Base64 of the certificate DER
    pub certificate_der: String,
}

impl IdentityRecord {
    /// Build a record, base64-encoding the certificate
    #[must_use]
    pub fn new(unique_id: String, private_key_pem: String, certificate_der: &[u8]) -> Self {
        Self {
            unique_id,
            private_key_pem,
            certificate_der: BASE64.encode(certificate_der),
        }
    }

    /// Decode the certificate DER
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the field is not valid base64.
    pub fn certificate_der_bytes(&self) -> Result<Vec<u8>, StorageError> {
        BASE64
            .decode(self.certificate_der.as_bytes())
            .map_err(|e| StorageError::Serialization(format!("certificate: {e}")))
    }
}

impl std::fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("unique_id", &self.unique_id)
            .finish_non_exhaustive()
    }
}

impl Drop for IdentityRecord {
    fn drop(&mut self) {
        self.private_key_pem.zeroize();
    }
}

/// Abstract storage interface for the client identity
#[async_trait]
pub trait IdentityStorage: Send + Sync {
    /// Load the stored record, if any
    ///
    /// # Errors
    ///
    /// Returns error if the backend exists but cannot be read
    async fn load(&self) -> Result<Option<IdentityRecord>, StorageError>;

    /// Replace the stored record
    ///
    /// # Errors
    ///
    /// Returns error if storage fails; the previous record is left intact
    async fn save(&mut self, record: &IdentityRecord) -> Result<(), StorageError>;

    /// Remove the stored record
    ///
    /// # Errors
    ///
    /// Returns error if removal fails
    async fn clear(&mut self) -> Result<(), StorageError>;
}

/// In-memory identity storage (non-persistent)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Option<IdentityRecord>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<IdentityRecord>, StorageError> {
        Ok(self.record.clone())
    }

    async fn save(&mut self, record: &IdentityRecord) -> Result<(), StorageError> {
        self.record = Some(record.clone());
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), StorageError> {
        self.record = None;
        Ok(())
    }
}

/// JSON file storage
///
/// Writes go to a sibling temporary file, created owner-only (0600 on unix),
/// that is renamed over the target. A crash never leaves a half-written
/// identity behind, and a failed save removes the temporary file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create file storage at the given path
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory cannot be created
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        Ok(Self { path })
    }

    /// Location of the identity file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl IdentityStorage for FileStorage {
    async fn load(&self) -> Result<Option<IdentityRecord>, StorageError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let record = tokio::task::spawn_blocking(move || serde_json::from_slice(&bytes))
            .await
            .map_err(|e| StorageError::Serialization(format!("Deserialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(Some(record))
    }

    async fn save(&mut self, record: &IdentityRecord) -> Result<(), StorageError> {
        let record = record.clone();
        let bytes = tokio::task::spawn_blocking(move || serde_json::to_vec_pretty(&record))
            .await
            .map_err(|e| StorageError::Serialization(format!("Serialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        let written = match write_private(&temp, &bytes).await {
            Ok(()) => tokio::fs::rename(&temp, &self.path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // The temp file holds the private key
            if let Err(remove) = tokio::fs::remove_file(&temp).await {
                if remove.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", temp.display(), remove);
                }
            }
            return Err(e.into());
        }

        tracing::debug!("Saved client identity to {}", self.path.display());
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to a fresh file only the owner can read
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // A leftover from an interrupted save may carry wider permissions
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
