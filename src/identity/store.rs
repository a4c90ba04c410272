use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{Mutex, RwLock};
use zeroize::Zeroizing;

use super::certificate::{ParsedCertificate, generate_certificate};
use super::storage::{FileStorage, IdentityRecord, IdentityStorage, MemoryStorage};
use super::IdentityError;
use crate::protocol::crypto::{RsaKeyPair, RsaPublicKey, hex_encode, random_array};

/// Length of the client unique id in bytes (hex doubles it)
const UNIQUE_ID_BYTES: usize = 8;

/// Generate a random 16-hex-character client identifier
#[must_use]
pub fn generate_unique_id() -> String {
    hex_encode(&random_array::<UNIQUE_ID_BYTES>())
}

/// The client's long-lived key pair and certificate
///
/// The certificate's public key always matches the private key.
pub struct ClientIdentity {
    unique_id: String,
    key: RsaKeyPair,
    certificate: ParsedCertificate,
    certificate_pem: String,
}

impl ClientIdentity {
    /// Generate a fresh key pair and certificate
    ///
    /// Blocks for the duration of RSA key generation.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if key or certificate generation fails.
    pub fn generate(unique_id: impl Into<String>) -> Result<Self, IdentityError> {
        Self::generate_at(unique_id, SystemTime::now())
    }

    /// Generate with an explicit issue time
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if key or certificate generation fails.
    pub fn generate_at(unique_id: impl Into<String>, now: SystemTime) -> Result<Self, IdentityError> {
        let key = RsaKeyPair::generate().map_err(IdentityError::KeyGeneration)?;
        let certificate = ParsedCertificate::from_certificate(generate_certificate(&key, now)?)?;
        Self::assemble(unique_id.into(), key, certificate)
    }

    /// Rebuild from a stored record
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Corrupt` if any field fails to decode or the
    /// certificate does not belong to the key.
    pub fn from_record(record: &IdentityRecord) -> Result<Self, IdentityError> {
        let key = RsaKeyPair::from_pkcs8_pem(&record.private_key_pem)
            .map_err(|e| IdentityError::Corrupt(e.to_string()))?;
        let der = record
            .certificate_der_bytes()
            .map_err(|e| IdentityError::Corrupt(e.to_string()))?;
        let certificate =
            ParsedCertificate::from_der(&der).map_err(|e| IdentityError::Corrupt(e.to_string()))?;

        if *certificate.public_key() != key.public_key() {
            return Err(IdentityError::Corrupt(
                "certificate does not match private key".to_string(),
            ));
        }
        if record.unique_id.is_empty() {
            return Err(IdentityError::Corrupt("empty unique id".to_string()));
        }

        Self::assemble(record.unique_id.clone(), key, certificate)
    }

    fn assemble(
        unique_id: String,
        key: RsaKeyPair,
        certificate: ParsedCertificate,
    ) -> Result<Self, IdentityError> {
        let certificate_pem = certificate.to_pem()?.replace('\r', "");
        Ok(Self {
            unique_id,
            key,
            certificate,
            certificate_pem,
        })
    }

    /// Encode for storage
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the private key cannot be encoded.
    pub fn to_record(&self) -> Result<IdentityRecord, IdentityError> {
        let pem = self
            .key
            .to_pkcs8_pem()
            .map_err(|e| IdentityError::Corrupt(e.to_string()))?;
        Ok(IdentityRecord::new(
            self.unique_id.clone(),
            pem.as_str().to_string(),
            self.certificate.der(),
        ))
    }

    /// Client identifier sent with every request
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Certificate DER
    #[must_use]
    pub fn certificate_der(&self) -> &[u8] {
        self.certificate.der()
    }

    /// Certificate PEM with LF line endings
    #[must_use]
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// Uppercase hex of the certificate PEM, as sent in step 1
    #[must_use]
    pub fn certificate_pem_hex(&self) -> String {
        hex_encode(self.certificate_pem.as_bytes())
    }

    /// Raw signature bytes of the certificate
    #[must_use]
    pub fn signature_of_certificate(&self) -> &[u8] {
        self.certificate.signature()
    }

    /// Public key from the certificate
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        self.certificate.public_key()
    }

    /// Sign with RSA PKCS#1 v1.5 over SHA-256
    #[must_use]
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.key.sign_sha256(data)
    }

    /// PKCS#8 DER of the private key, for TLS client authentication
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the key cannot be encoded.
    pub fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>, IdentityError> {
        self.key
            .to_pkcs8_der()
            .map_err(|e| IdentityError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("unique_id", &self.unique_id)
            .finish_non_exhaustive()
    }
}

/// Owner of the durable client identity
///
/// Creation and regeneration hold the storage lock, so only one writer runs
/// at a time. Once an identity exists, readers share it without blocking
/// each other.
pub struct IdentityStore {
    storage: Mutex<Box<dyn IdentityStorage>>,
    current: RwLock<Option<Arc<ClientIdentity>>>,
}

impl IdentityStore {
    /// Create a store over the given backend
    pub fn new(storage: impl IdentityStorage + 'static) -> Self {
        Self {
            storage: Mutex::new(Box::new(storage)),
            current: RwLock::new(None),
        }
    }

    /// Create a store that forgets its identity on drop
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Create a store persisted to a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory cannot be created
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        Ok(Self::new(FileStorage::new(path).await?))
    }

    /// The identity currently loaded, if any
    pub async fn current(&self) -> Option<Arc<ClientIdentity>> {
        self.current.read().await.clone()
    }

    /// Return the existing identity, creating it on first use
    ///
    /// A stored identity that cannot be decoded is an error; it is never
    /// replaced silently. Use [`regenerate_identity`](Self::regenerate_identity)
    /// to recover.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if loading, generation or persistence fails.
    pub async fn ensure_identity(&self) -> Result<Arc<ClientIdentity>, IdentityError> {
        if let Some(identity) = self.current().await {
            return Ok(identity);
        }

        let mut storage = self.storage.lock().await;

        // Another task may have finished while we waited for the lock
        if let Some(identity) = self.current().await {
            return Ok(identity);
        }

        if let Some(identity) = self.load_locked(&**storage).await? {
            return Ok(identity);
        }

        let identity = Arc::new(generate_blocking(generate_unique_id()).await?);
        storage.save(&identity.to_record()?).await?;
        *self.current.write().await = Some(Arc::clone(&identity));

        tracing::info!("Created client identity {}", identity.unique_id());
        Ok(identity)
    }

    /// Replace the key pair and certificate, keeping the unique id
    ///
    /// The new identity becomes visible only after it has been persisted.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if generation or persistence fails; the old
    /// identity stays in place.
    pub async fn regenerate_identity(&self) -> Result<Arc<ClientIdentity>, IdentityError> {
        let mut storage = self.storage.lock().await;

        let unique_id = match self.current().await {
            Some(identity) => identity.unique_id().to_string(),
            None => match storage.load().await {
                Ok(Some(record)) if !record.unique_id.is_empty() => record.unique_id.clone(),
                Ok(_) => generate_unique_id(),
                Err(e) => {
                    tracing::warn!("Stored identity unreadable, using a new unique id: {}", e);
                    generate_unique_id()
                }
            },
        };

        let identity = Arc::new(generate_blocking(unique_id).await?);
        storage.save(&identity.to_record()?).await?;
        *self.current.write().await = Some(Arc::clone(&identity));

        tracing::info!("Regenerated client identity {}", identity.unique_id());
        Ok(identity)
    }

    /// Forget the identity, in memory and in storage
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the backend cannot remove the record.
    pub async fn clear(&self) -> Result<(), IdentityError> {
        let mut storage = self.storage.lock().await;
        storage.clear().await?;
        *self.current.write().await = None;
        Ok(())
    }

    /// Sign with the stored private key
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Signing` if no identity has been created.
    pub async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let identity = self
            .existing()
            .await?
            .ok_or_else(|| IdentityError::Signing("no client identity".to_string()))?;
        Ok(identity.sign(data))
    }

    /// Raw signature bytes of the certificate
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the identity cannot be loaded or created.
    pub async fn signature_of_certificate(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(self.ensure_identity().await?.signature_of_certificate().to_vec())
    }

    /// Certificate DER
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the identity cannot be loaded or created.
    pub async fn certificate_der(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(self.ensure_identity().await?.certificate_der().to_vec())
    }

    /// Uppercase hex of the certificate PEM
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the identity cannot be loaded or created.
    pub async fn certificate_pem_hex(&self) -> Result<String, IdentityError> {
        Ok(self.ensure_identity().await?.certificate_pem_hex())
    }

    /// Loaded or stored identity, without creating one
    async fn existing(&self) -> Result<Option<Arc<ClientIdentity>>, IdentityError> {
        if let Some(identity) = self.current().await {
            return Ok(Some(identity));
        }
        let storage = self.storage.lock().await;
        if let Some(identity) = self.current().await {
            return Ok(Some(identity));
        }
        self.load_locked(&**storage).await
    }

    /// Load from storage into memory; the caller holds the storage lock
    async fn load_locked(
        &self,
        storage: &dyn IdentityStorage,
    ) -> Result<Option<Arc<ClientIdentity>>, IdentityError> {
        let Some(record) = storage.load().await? else {
            return Ok(None);
        };

        let identity = match ClientIdentity::from_record(&record) {
            Ok(identity) => Arc::new(identity),
            Err(e) => {
                tracing::warn!("Stored client identity rejected: {}", e);
                return Err(e);
            }
        };
        *self.current.write().await = Some(Arc::clone(&identity));

        tracing::debug!("Loaded client identity {}", identity.unique_id());
        Ok(Some(identity))
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore").finish_non_exhaustive()
    }
}

async fn generate_blocking(unique_id: String) -> Result<ClientIdentity, IdentityError> {
    tokio::task::spawn_blocking(move || ClientIdentity::generate(unique_id))
        .await
        .map_err(|e| IdentityError::Task(e.to_string()))?
}
