//! RSA keys for the client identity and host-proof checks

use rand::rngs::OsRng;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::CryptoError;

/// RSA key sizes used by the pairing protocol
pub mod sizes {
    /// RSA modulus size (2048 bits)
    pub const MODULUS_BITS: usize = 2048;
    /// RSA modulus size in bytes
    pub const MODULUS_BYTES: usize = 256;
    /// PKCS#1 v1.5 signature size
    pub const SIGNATURE_BYTES: usize = 256;
}

/// RSA private key held by the client
#[derive(Clone)]
pub struct RsaKeyPair {
    inner: rsa::RsaPrivateKey,
    signing_key: SigningKey<Sha256>,
}

impl RsaKeyPair {
    /// Generate a new 2048-bit key pair
    ///
    /// This is slow (hundreds of milliseconds); call it off the async executor.
    pub fn generate() -> Result<Self, CryptoError> {
        let inner = rsa::RsaPrivateKey::new(&mut OsRng, sizes::MODULUS_BITS)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

        Ok(Self::from_private_key(inner))
    }

    /// Load from a PKCS#8 PEM document
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let inner = rsa::RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_private_key(inner))
    }

    fn from_private_key(inner: rsa::RsaPrivateKey) -> Self {
        let signing_key = SigningKey::<Sha256>::new(inner.clone());
        Self { inner, signing_key }
    }

    /// Encode as a PKCS#8 PEM document
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        self.inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))
    }

    /// Encode as PKCS#8 DER, the form TLS stacks load
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let document = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    /// Sign with PKCS#1 v1.5 over SHA-256
    #[must_use]
    pub fn sign_sha256(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_vec()
    }

    /// Get the corresponding public key
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    pub(crate) fn signing_key(&self) -> &SigningKey<Sha256> {
        &self.signing_key
    }

    pub(crate) fn raw_public_key(&self) -> rsa::RsaPublicKey {
        self.inner.to_public_key()
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair").finish_non_exhaustive()
    }
}

/// RSA public key, usually taken from a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    inner: rsa::RsaPublicKey,
}

impl RsaPublicKey {
    /// Parse a DER `SubjectPublicKeyInfo`
    pub fn from_spki_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            rsa::RsaPublicKey::from_public_key_der(der).map_err(|_| CryptoError::InvalidPublicKey)?;

        Ok(Self { inner })
    }

    /// Verify a PKCS#1 v1.5 SHA-256 signature
    pub fn verify_sha256(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let verifying_key = VerifyingKey::<Sha256>::new(self.inner.clone());
        let sig = Signature::try_from(signature).map_err(|_| CryptoError::InvalidSignature)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}
