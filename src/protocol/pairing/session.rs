//! Per-attempt handshake state and the cryptography of each step
//!
//! `PairingSession` never touches the network. Each step is a pair of calls:
//! one producing the query parameters to send, one consuming the host's
//! response and advancing the state. The driver in [`crate::pairing`] moves
//! the bytes.

use zeroize::Zeroizing;

use super::messages::{self, QueryParams};
use super::response::{PairingResponse, names};
use super::{PairState, Pin};
use crate::error::PairingError;
use crate::identity::{ClientIdentity, ParsedCertificate};
use crate::protocol::crypto::{
    aes128_ecb_decrypt, aes128_ecb_encrypt, concat, constant_time_eq, derive_key, hex_decode,
    lengths, random_array, sha256_concat,
};
use crate::types::HostAddress;

/// Minimum decrypted `challengeresponse`: `server_hash ∥ server_challenge`
pub const CHALLENGE_RESPONSE_MIN: usize = lengths::SHA256_DIGEST + lengths::CHALLENGE;

/// One pairing attempt; never persisted and never resumed after failure
pub struct PairingSession {
    host: HostAddress,
    pin: Pin,
    client_salt: [u8; lengths::SALT],
    derived_key: Option<Zeroizing<[u8; lengths::AES_128_KEY]>>,
    client_challenge: Option<[u8; lengths::CHALLENGE]>,
    server_hash: Option<[u8; lengths::SHA256_DIGEST]>,
    server_challenge: Option<[u8; lengths::CHALLENGE]>,
    client_secret: Option<Zeroizing<[u8; lengths::SECRET]>>,
    host_certificate: Option<ParsedCertificate>,
    host_proof_verified: bool,
    state: PairState,
}

impl PairingSession {
    /// Start a session with a fresh random salt
    #[must_use]
    pub fn new(host: HostAddress, pin: Pin) -> Self {
        Self {
            host,
            pin,
            client_salt: random_array(),
            derived_key: None,
            client_challenge: None,
            server_hash: None,
            server_challenge: None,
            client_secret: None,
            host_certificate: None,
            host_proof_verified: false,
            state: PairState::NotPaired,
        }
    }

    /// Target host
    #[must_use]
    pub fn host(&self) -> &HostAddress {
        &self.host
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PairState {
        self.state
    }

    /// Salt sent in step 1
    #[must_use]
    pub fn client_salt(&self) -> &[u8; lengths::SALT] {
        &self.client_salt
    }

    /// Session key, once step 2 has been prepared
    #[must_use]
    pub fn derived_key(&self) -> Option<&[u8; lengths::AES_128_KEY]> {
        self.derived_key.as_deref()
    }

    /// Client secret, once step 3 has been prepared
    #[must_use]
    pub fn client_secret(&self) -> Option<&[u8; lengths::SECRET]> {
        self.client_secret.as_deref()
    }

    /// Server challenge from the step 2 response
    #[must_use]
    pub fn server_challenge(&self) -> Option<&[u8; lengths::CHALLENGE]> {
        self.server_challenge.as_ref()
    }

    /// Host certificate from the step 1 response, if the host disclosed it
    #[must_use]
    pub fn host_certificate(&self) -> Option<&ParsedCertificate> {
        self.host_certificate.as_ref()
    }

    /// Whether the host proved knowledge of the PIN in step 3
    #[must_use]
    pub fn host_proof_verified(&self) -> bool {
        self.host_proof_verified
    }

    /// Mark the session failed
    pub fn fail(&mut self, error: &PairingError) {
        self.state = PairState::Failed(error.kind());
    }

    fn expect(&self, expected: PairState) -> Result<(), PairingError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PairingError::protocol(format!(
                "step out of order: session is {}, expected {expected}",
                self.state
            )))
        }
    }

    fn key(&self) -> Result<&[u8; lengths::AES_128_KEY], PairingError> {
        self.derived_key()
            .ok_or_else(|| PairingError::protocol("session key not derived"))
    }

    // --- step 1 ---

    /// Step 1 request: salt and client certificate
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Protocol` if the session has already started.
    pub fn server_cert_request(
        &self,
        device_name: &str,
        identity: &ClientIdentity,
    ) -> Result<QueryParams, PairingError> {
        self.expect(PairState::NotPaired)?;
        Ok(messages::get_server_cert(
            device_name,
            &self.client_salt,
            &identity.certificate_pem_hex(),
        ))
    }

    /// Consume the step 1 response
    ///
    /// # Errors
    ///
    /// `Rejected` unless the host answered 200 with `paired=1`;
    /// `Protocol` if a disclosed host certificate cannot be parsed.
    pub fn handle_server_cert(&mut self, response: &PairingResponse) -> Result<(), PairingError> {
        self.expect(PairState::NotPaired)?;

        if !response.is_success() {
            return Err(PairingError::rejected(format!(
                "host answered {} {}",
                response.status_code, response.status_message
            )));
        }
        if !response.paired() {
            return Err(PairingError::rejected(format!(
                "host declined pairing (paired={})",
                response.field(names::PAIRED).unwrap_or("")
            )));
        }

        if let Some(hex) = response.field(names::PLAIN_CERT).filter(|h| !h.is_empty()) {
            let pem = String::from_utf8(hex_decode(hex)?)
                .map_err(|_| PairingError::protocol("host certificate is not text"))?;
            let certificate = ParsedCertificate::from_pem(&pem)
                .map_err(|e| PairingError::protocol(format!("host certificate: {e}")))?;
            self.host_certificate = Some(certificate);
        }

        self.state = PairState::PinRequested;
        Ok(())
    }

    // --- step 2 ---

    /// Step 2 request: derive the session key and send an encrypted challenge
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Protocol` if step 1 has not completed.
    pub fn client_challenge_request(&mut self, device_name: &str) -> Result<QueryParams, PairingError> {
        self.expect(PairState::PinRequested)?;

        let key = Zeroizing::new(derive_key(&self.client_salt, self.pin.as_str()));
        let challenge: [u8; lengths::CHALLENGE] = random_array();
        let encrypted = aes128_ecb_encrypt(&challenge, &key[..])?;

        self.derived_key = Some(key);
        self.client_challenge = Some(challenge);
        Ok(messages::client_challenge(device_name, &encrypted))
    }

    /// Consume the step 2 response
    ///
    /// # Errors
    ///
    /// `PinMismatch` if the host rejected the challenge; `Protocol` if
    /// `challengeresponse` is missing, malformed or shorter than 48 bytes.
    pub fn handle_challenge_response(&mut self, response: &PairingResponse) -> Result<(), PairingError> {
        self.expect(PairState::PinRequested)?;

        if !response.is_success() || !response.paired() {
            return Err(PairingError::pin_mismatch(format!(
                "host rejected the client challenge ({} {})",
                response.status_code, response.status_message
            )));
        }

        let encrypted = response
            .field(names::CHALLENGE_RESPONSE)
            .ok_or_else(|| PairingError::protocol("missing challengeresponse"))?;
        let decrypted = aes128_ecb_decrypt(&hex_decode(encrypted)?, self.key()?)?;

        if decrypted.len() < CHALLENGE_RESPONSE_MIN {
            return Err(PairingError::protocol(format!(
                "challengeresponse decrypted to {} bytes, expected at least {CHALLENGE_RESPONSE_MIN}",
                decrypted.len()
            )));
        }

        let mut server_hash = [0u8; lengths::SHA256_DIGEST];
        server_hash.copy_from_slice(&decrypted[..lengths::SHA256_DIGEST]);
        let mut server_challenge = [0u8; lengths::CHALLENGE];
        server_challenge.copy_from_slice(&decrypted[lengths::SHA256_DIGEST..CHALLENGE_RESPONSE_MIN]);

        self.server_hash = Some(server_hash);
        self.server_challenge = Some(server_challenge);
        self.state = PairState::ChallengeSent;
        Ok(())
    }

    // --- step 3 ---

    /// Step 3 request: encrypted `SHA256(server_challenge ∥ cert_signature ∥ client_secret)`
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Protocol` if step 2 has not completed.
    pub fn server_challenge_response_request(
        &mut self,
        device_name: &str,
        identity: &ClientIdentity,
    ) -> Result<QueryParams, PairingError> {
        self.expect(PairState::ChallengeSent)?;

        let server_challenge = self
            .server_challenge
            .ok_or_else(|| PairingError::protocol("no server challenge"))?;
        let secret = Zeroizing::new(random_array::<{ lengths::SECRET }>());

        let hash = sha256_concat(&[
            &server_challenge,
            identity.signature_of_certificate(),
            &secret[..],
        ]);
        let encrypted = aes128_ecb_encrypt(&hash, self.key()?)?;

        self.client_secret = Some(secret);
        Ok(messages::server_challenge_response(device_name, &encrypted))
    }

    /// Consume the step 3 response
    ///
    /// When the host disclosed its certificate in step 1 and its pairing
    /// secret here, its proof is checked as well.
    ///
    /// # Errors
    ///
    /// `PinMismatch` if the host did not accept the hash or its own proof
    /// does not match; `Protocol` if its pairing secret is malformed or
    /// carries a bad signature.
    pub fn handle_server_challenge_response(
        &mut self,
        response: &PairingResponse,
    ) -> Result<(), PairingError> {
        self.expect(PairState::ChallengeSent)?;

        if !response.is_success() || !response.paired() {
            return Err(PairingError::pin_mismatch(format!(
                "key exchange failed ({} {})",
                response.status_code, response.status_message
            )));
        }

        self.host_proof_verified = self.verify_host_proof(response)?;
        self.state = PairState::SecretExchanged;
        Ok(())
    }

    fn verify_host_proof(&self, response: &PairingResponse) -> Result<bool, PairingError> {
        let (Some(certificate), Some(secret_hex)) = (
            self.host_certificate.as_ref(),
            response.field(names::PAIRING_SECRET).filter(|s| !s.is_empty()),
        ) else {
            return Ok(false);
        };

        let pairing_secret = hex_decode(secret_hex)?;
        if pairing_secret.len() <= lengths::SECRET {
            return Err(PairingError::protocol("host pairing secret too short"));
        }
        let (server_secret, signature) = pairing_secret.split_at(lengths::SECRET);

        certificate
            .public_key()
            .verify_sha256(server_secret, signature)
            .map_err(|_| PairingError::protocol("host pairing secret signature is invalid"))?;

        let (Some(client_challenge), Some(server_hash)) = (self.client_challenge, self.server_hash)
        else {
            return Err(PairingError::protocol("host proof without a challenge"));
        };
        let expected = sha256_concat(&[&client_challenge, certificate.signature(), server_secret]);
        if !constant_time_eq(&expected, &server_hash) {
            return Err(PairingError::pin_mismatch(
                "host proof does not match; the PIN differs",
            ));
        }

        Ok(true)
    }

    // --- step 4 ---

    /// Step 4 request: `client_secret ∥ sign(client_secret)`
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Protocol` if step 3 has not completed.
    pub fn client_pairing_secret_request(
        &self,
        device_name: &str,
        identity: &ClientIdentity,
    ) -> Result<QueryParams, PairingError> {
        self.expect(PairState::SecretExchanged)?;

        let secret = self
            .client_secret()
            .ok_or_else(|| PairingError::protocol("no client secret"))?;
        let payload = concat(secret, &identity.sign(secret));
        Ok(messages::client_pairing_secret(device_name, &payload))
    }

    /// Consume the step 4 response
    ///
    /// # Errors
    ///
    /// `PinMismatch` unless the host answered 200 with `paired=1`.
    pub fn handle_client_pairing_secret(
        &mut self,
        response: &PairingResponse,
    ) -> Result<(), PairingError> {
        self.expect(PairState::SecretExchanged)?;

        if !response.is_success() || !response.paired() {
            return Err(PairingError::pin_mismatch(format!(
                "host refused the pairing secret ({} {})",
                response.status_code, response.status_message
            )));
        }

        self.state = PairState::Paired;
        Ok(())
    }
}

impl std::fmt::Debug for PairingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingSession")
            .field("host", &self.host)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
