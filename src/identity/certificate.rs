//! Self-signed client certificate

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use x509_cert::Certificate;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::der::asn1::{BitString, GeneralizedTime, UtcTime};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, DecodePem, Encode, EncodePem};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{DynSignatureAlgorithmIdentifier, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};

use super::IdentityError;
use crate::protocol::crypto::{RsaKeyPair, RsaPublicKey};

/// Subject and issuer of every client certificate
pub const CLIENT_CERT_SUBJECT: &str = "CN=NVIDIA GameStream Client";

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
const TWENTY_YEARS: Duration = Duration::from_secs(20 * 365 * 24 * 60 * 60);

/// Issue a self-signed X.509 v3 certificate for `key`
///
/// Validity runs from a day before `now` to twenty years after it, and the
/// serial number is `now` in milliseconds since the Unix epoch. The
/// certificate is v3 and carries no extensions; TLS stacks refuse v1.
pub fn generate_certificate(key: &RsaKeyPair, now: SystemTime) -> Result<Certificate, IdentityError> {
    let since_epoch = now
        .duration_since(UNIX_EPOCH)
        .map_err(|e| IdentityError::Certificate(format!("clock before epoch: {e}")))?;

    let not_before = since_epoch.saturating_sub(ONE_DAY);
    let not_after = since_epoch + TWENTY_YEARS;
    let validity = Validity {
        not_before: validity_time(not_before)?,
        not_after: validity_time(not_after)?,
    };

    let millis = u64::try_from(since_epoch.as_millis())
        .map_err(|_| IdentityError::Certificate("clock out of range".to_string()))?;
    let bytes = millis.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let serial_number = SerialNumber::new(&bytes[first..]).map_err(certificate_error)?;

    let subject = Name::from_str(CLIENT_CERT_SUBJECT).map_err(certificate_error)?;
    let subject_public_key_info =
        SubjectPublicKeyInfoOwned::from_key(key.raw_public_key()).map_err(certificate_error)?;
    let algorithm = key
        .signing_key()
        .signature_algorithm_identifier()
        .map_err(certificate_error)?;

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: algorithm.clone(),
        issuer: subject.clone(),
        validity,
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    let tbs_der = tbs_certificate.to_der().map_err(certificate_error)?;
    let signature = BitString::from_bytes(&key.sign_sha256(&tbs_der)).map_err(certificate_error)?;

    Ok(Certificate {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature,
    })
}

fn certificate_error(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Certificate(err.to_string())
}

/// UTCTime through 2049, GeneralizedTime after
fn validity_time(since_epoch: Duration) -> Result<Time, IdentityError> {
    // Both encodings have whole-second precision
    let whole = Duration::from_secs(since_epoch.as_secs());

    match UtcTime::from_unix_duration(whole) {
        Ok(time) => Ok(Time::UtcTime(time)),
        Err(_) => GeneralizedTime::from_unix_duration(whole)
            .map(Time::GeneralTime)
            .map_err(certificate_error),
    }
}

/// A certificate with the pieces the handshake needs pulled out
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    certificate: Certificate,
    der: Vec<u8>,
    signature: Vec<u8>,
    public_key: RsaPublicKey,
}

impl ParsedCertificate {
    /// Wrap an already decoded certificate
    pub fn from_certificate(certificate: Certificate) -> Result<Self, IdentityError> {
        let der = certificate
            .to_der()
            .map_err(|e| IdentityError::Certificate(e.to_string()))?;
        Self::with_der(certificate, der)
    }

    fn with_der(certificate: Certificate, der: Vec<u8>) -> Result<Self, IdentityError> {
        let signature = certificate
            .signature
            .as_bytes()
            .ok_or_else(|| IdentityError::Certificate("signature has unused bits".to_string()))?
            .to_vec();
        let spki_der = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| IdentityError::Certificate(e.to_string()))?;
        let public_key = RsaPublicKey::from_spki_der(&spki_der)
            .map_err(|e| IdentityError::Certificate(e.to_string()))?;

        Ok(Self {
            certificate,
            der,
            signature,
            public_key,
        })
    }

    /// Decode DER
    pub fn from_der(der: &[u8]) -> Result<Self, IdentityError> {
        let certificate =
            Certificate::from_der(der).map_err(|e| IdentityError::Certificate(e.to_string()))?;
        // Keep the caller's bytes so stored identities round-trip exactly
        Self::with_der(certificate, der.to_vec())
    }

    /// Decode a PEM document, tolerating CRLF line endings
    pub fn from_pem(pem: &str) -> Result<Self, IdentityError> {
        let normalized = pem.replace('\r', "");
        let certificate = Certificate::from_pem(normalized.trim().as_bytes())
            .map_err(|e| IdentityError::Certificate(e.to_string()))?;
        Self::from_certificate(certificate)
    }

    /// DER encoding
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// PEM encoding with LF line endings
    pub fn to_pem(&self) -> Result<String, IdentityError> {
        self.certificate
            .to_pem(LineEnding::LF)
            .map_err(|e| IdentityError::Certificate(e.to_string()))
    }

    /// Raw bytes of the issuer's signature over the certificate
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Subject public key
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// The decoded certificate
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}
