//! Host side of the pairing handshake
//!
//! Computes and verifies the same values a GameStream host does, without
//! any I/O, so it can sit behind a TCP server or an in-process transport.

use std::sync::Arc;

use tracing::debug;

use crate::identity::{ClientIdentity, ParsedCertificate};
use crate::protocol::crypto::{
    aes128_ecb_decrypt, aes128_ecb_encrypt, constant_time_eq, derive_key, hex_decode, hex_encode,
    lengths, random_array, sha256_concat,
};
use crate::protocol::pairing::{PairingResponse, PairingStep, names, params};
use crate::protocol::xml::encode_response;

/// Deviations from a well-behaved host
#[derive(Debug, Clone)]
pub struct HostBehavior {
    /// Answer `paired=0` at this step
    pub reject_at: Option<PairingStep>,
    /// Send only the 32-byte hash in `challengeresponse`
    pub short_challenge_response: bool,
    /// Send `plaincert` in step 1 and `pairingsecret` in step 3
    pub disclose_certificate: bool,
    /// Hash a secret other than the one disclosed in `pairingsecret`
    pub forge_proof: bool,
}

impl Default for HostBehavior {
    fn default() -> Self {
        Self {
            reject_at: None,
            short_challenge_response: false,
            disclose_certificate: true,
            forge_proof: false,
        }
    }
}

/// A host answer before encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReply {
    /// `status_code` attribute
    pub status_code: u16,
    /// `status_message` attribute
    pub status_message: String,
    /// Child elements in order
    pub fields: Vec<(String, String)>,
}

impl HostReply {
    /// 200 reply carrying `fields`
    #[must_use]
    pub fn ok(fields: &[(&str, &str)]) -> Self {
        Self {
            status_code: 200,
            status_message: "OK".to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// 200 reply with `paired` set accordingly
    #[must_use]
    pub fn paired(paired: bool) -> Self {
        Self::ok(&[(names::PAIRED, if paired { "1" } else { "0" })])
    }

    /// Error reply without fields
    #[must_use]
    pub fn error(status_code: u16, status_message: &str) -> Self {
        Self {
            status_code,
            status_message: status_message.to_string(),
            fields: Vec::new(),
        }
    }

    fn with(mut self, name: &str, value: String) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    /// Whether the reply reports `paired=1`
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.fields
            .iter()
            .any(|(k, v)| k == names::PAIRED && v == "1")
    }

    /// Encode as the host's XML document
    #[must_use]
    pub fn to_xml(&self) -> String {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        encode_response(self.status_code, &self.status_message, &fields)
    }

    /// Decode as the client would
    #[must_use]
    pub fn to_response(&self) -> PairingResponse {
        PairingResponse::from_parts(self.status_code, &self.status_message, self.to_xml())
    }
}

/// Sans-IO host state for one client
pub struct HostHandshake {
    pin: String,
    identity: Arc<ClientIdentity>,
    behavior: HostBehavior,
    client_certificate: Option<ParsedCertificate>,
    key: Option<[u8; lengths::AES_128_KEY]>,
    server_challenge: [u8; lengths::CHALLENGE],
    server_secret: [u8; lengths::SECRET],
    client_hash: Option<Vec<u8>>,
    paired_certificate: Option<Vec<u8>>,
}

impl HostHandshake {
    /// Host expecting `pin`, presenting `identity`
    pub fn new(pin: impl Into<String>, identity: Arc<ClientIdentity>, behavior: HostBehavior) -> Self {
        Self {
            pin: pin.into(),
            identity,
            behavior,
            client_certificate: None,
            key: None,
            server_challenge: random_array(),
            server_secret: random_array(),
            client_hash: None,
            paired_certificate: None,
        }
    }

    /// The host's own certificate and key
    #[must_use]
    pub fn identity(&self) -> &Arc<ClientIdentity> {
        &self.identity
    }

    /// DER of the client certificate accepted in step 4
    #[must_use]
    pub fn paired_certificate(&self) -> Option<&[u8]> {
        self.paired_certificate.as_deref()
    }

    /// Forget the paired client
    pub fn unpair(&mut self) {
        self.paired_certificate = None;
    }

    /// Whether `peer` is the paired client certificate
    #[must_use]
    pub fn is_paired_peer(&self, peer: Option<&[u8]>) -> bool {
        matches!((peer, self.paired_certificate()), (Some(peer), Some(paired)) if peer == paired)
    }

    /// Answer one `/pair` query
    ///
    /// `peer` is the client certificate presented over TLS, if any.
    pub fn handle(&mut self, query: &[(String, String)], peer: Option<&[u8]>) -> HostReply {
        let Some(step) = PairingStep::classify(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        else {
            return HostReply::error(400, "Unknown pairing request");
        };

        if self.behavior.reject_at == Some(step) {
            debug!("Mock host rejecting {}", step);
            return HostReply::paired(false);
        }

        let result = match step {
            PairingStep::GetServerCert => self.get_server_cert(query),
            PairingStep::ClientChallenge => self.client_challenge(query),
            PairingStep::ServerChallengeResponse => self.server_challenge_response(query),
            PairingStep::ClientPairingSecret => self.client_pairing_secret(query),
            PairingStep::PairChallenge => Ok(HostReply::paired(self.is_paired_peer(peer))),
        };

        result.unwrap_or_else(|reason| {
            debug!("Mock host refused {}: {}", step, reason);
            HostReply::paired(false)
        })
    }

    fn get_server_cert(&mut self, query: &[(String, String)]) -> Result<HostReply, String> {
        let salt = decode(query, params::SALT)?;
        let pem = String::from_utf8(decode(query, params::CLIENT_CERT)?).map_err(|e| e.to_string())?;
        let certificate = ParsedCertificate::from_pem(&pem).map_err(|e| e.to_string())?;

        self.key = Some(derive_key(&salt, &self.pin));
        self.client_certificate = Some(certificate);
        self.server_challenge = random_array();
        self.server_secret = random_array();
        self.client_hash = None;

        let reply = HostReply::paired(true);
        Ok(if self.behavior.disclose_certificate {
            reply.with(names::PLAIN_CERT, hex_encode(self.identity.certificate_pem().as_bytes()))
        } else {
            reply
        })
    }

    fn client_challenge(&mut self, query: &[(String, String)]) -> Result<HostReply, String> {
        let key = self.key.ok_or("no salt yet")?;
        let challenge = aes128_ecb_decrypt(&decode(query, params::CLIENT_CHALLENGE)?, &key)
            .map_err(|e| e.to_string())?;
        if challenge.len() < lengths::CHALLENGE {
            return Err("client challenge too short".to_string());
        }

        let hashed_secret: [u8; lengths::SECRET] = if self.behavior.forge_proof {
            random_array()
        } else {
            self.server_secret
        };
        let hash = sha256_concat(&[
            &challenge[..lengths::CHALLENGE],
            self.identity.signature_of_certificate(),
            &hashed_secret,
        ]);

        let mut plaintext = hash.to_vec();
        if !self.behavior.short_challenge_response {
            plaintext.extend_from_slice(&self.server_challenge);
        }
        let encrypted = aes128_ecb_encrypt(&plaintext, &key).map_err(|e| e.to_string())?;

        Ok(HostReply::paired(true).with(names::CHALLENGE_RESPONSE, hex_encode(&encrypted)))
    }

    fn server_challenge_response(&mut self, query: &[(String, String)]) -> Result<HostReply, String> {
        let key = self.key.ok_or("no salt yet")?;
        let hash = aes128_ecb_decrypt(&decode(query, params::SERVER_CHALLENGE_RESP)?, &key)
            .map_err(|e| e.to_string())?;
        if hash.len() < lengths::SHA256_DIGEST {
            return Err("challenge hash too short".to_string());
        }
        self.client_hash = Some(hash[..lengths::SHA256_DIGEST].to_vec());

        let reply = HostReply::paired(true);
        Ok(if self.behavior.disclose_certificate {
            let signature = self.identity.sign(&self.server_secret);
            let mut secret = self.server_secret.to_vec();
            secret.extend_from_slice(&signature);
            reply.with(names::PAIRING_SECRET, hex_encode(&secret))
        } else {
            reply
        })
    }

    fn client_pairing_secret(&mut self, query: &[(String, String)]) -> Result<HostReply, String> {
        let payload = decode(query, params::CLIENT_PAIRING_SECRET)?;
        if payload.len() <= lengths::SECRET {
            return Err("pairing secret too short".to_string());
        }
        let (secret, signature) = payload.split_at(lengths::SECRET);

        let certificate = self.client_certificate.as_ref().ok_or("no client certificate")?;
        certificate
            .public_key()
            .verify_sha256(secret, signature)
            .map_err(|_| "client signature does not verify")?;

        let client_hash = self.client_hash.as_deref().ok_or("no challenge hash")?;
        let expected = sha256_concat(&[&self.server_challenge, certificate.signature(), secret]);
        if !constant_time_eq(&expected, client_hash) {
            return Err("challenge hash mismatch".to_string());
        }

        self.paired_certificate = Some(certificate.der().to_vec());
        Ok(HostReply::paired(true))
    }
}

impl std::fmt::Debug for HostHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHandshake")
            .field("behavior", &self.behavior)
            .field("paired", &self.paired_certificate.is_some())
            .finish_non_exhaustive()
    }
}

fn decode(query: &[(String, String)], name: &str) -> Result<Vec<u8>, String> {
    let value = query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| format!("missing {name}"))?;
    hex_decode(value).map_err(|e| e.to_string())
}
