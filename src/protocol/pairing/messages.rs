//! Request parameters for each handshake step

use std::fmt;

use crate::protocol::crypto::hex_encode;

/// Pairing endpoint
pub const PAIR_PATH: &str = "/pair";
/// Host information endpoint
pub const SERVER_INFO_PATH: &str = "/serverinfo";
/// Unpair endpoint
pub const UNPAIR_PATH: &str = "/unpair";

/// Query parameter names
pub mod params {
    /// Client identifier; added by the transport
    pub const UNIQUE_ID: &str = "uniqueid";
    /// Client display name
    pub const DEVICE_NAME: &str = "devicename";
    /// Always `0`
    pub const UPDATE_TIMESTAMP: &str = "updateTimestamp";
    /// Always `0`
    pub const LOCAL_VERSION: &str = "localversion";
    /// Step selector for steps 1 and 5
    pub const PHRASE: &str = "phrase";
    /// Hex of the client salt
    pub const SALT: &str = "salt";
    /// Hex of the client certificate PEM
    pub const CLIENT_CERT: &str = "clientcert";
    /// Hex of the encrypted client challenge
    pub const CLIENT_CHALLENGE: &str = "clientchallenge";
    /// Hex of the encrypted challenge hash
    pub const SERVER_CHALLENGE_RESP: &str = "serverchallengeresp";
    /// Hex of `client_secret ∥ signature`
    pub const CLIENT_PAIRING_SECRET: &str = "clientpairingsecret";
}

/// Values of the `phrase` parameter
pub mod phrases {
    /// Step 1
    pub const GET_SERVER_CERT: &str = "getservercert";
    /// Optional confirmation over TLS
    pub const PAIR_CHALLENGE: &str = "pairchallenge";
}

/// Ordered query parameters
pub type QueryParams = Vec<(String, String)>;

/// One round trip of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingStep {
    /// Step 1: send salt and certificate, host prompts for the PIN
    GetServerCert,
    /// Step 2: encrypted client challenge
    ClientChallenge,
    /// Step 3: encrypted hash over the server challenge
    ServerChallengeResponse,
    /// Step 4: signed client secret
    ClientPairingSecret,
    /// Optional step 5 over TLS
    PairChallenge,
}

impl PairingStep {
    /// The four mandatory steps in order
    pub const MANDATORY: [PairingStep; 4] = [
        Self::GetServerCert,
        Self::ClientChallenge,
        Self::ServerChallengeResponse,
        Self::ClientPairingSecret,
    ];

    /// One-based step number
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::GetServerCert => 1,
            Self::ClientChallenge => 2,
            Self::ServerChallengeResponse => 3,
            Self::ClientPairingSecret => 4,
            Self::PairChallenge => 5,
        }
    }

    /// Identify the step a `/pair` query belongs to
    pub fn classify<'a, I>(query: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in query {
            let step = match (name, value) {
                (params::PHRASE, phrases::GET_SERVER_CERT) => Self::GetServerCert,
                (params::PHRASE, phrases::PAIR_CHALLENGE) => Self::PairChallenge,
                (params::CLIENT_CHALLENGE, _) => Self::ClientChallenge,
                (params::SERVER_CHALLENGE_RESP, _) => Self::ServerChallengeResponse,
                (params::CLIENT_PAIRING_SECRET, _) => Self::ClientPairingSecret,
                _ => continue,
            };
            return Some(step);
        }
        None
    }
}

impl fmt::Display for PairingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetServerCert => "getservercert",
            Self::ClientChallenge => "clientchallenge",
            Self::ServerChallengeResponse => "serverchallengeresp",
            Self::ClientPairingSecret => "clientpairingsecret",
            Self::PairChallenge => "pairchallenge",
        };
        write!(f, "step {} ({name})", self.number())
    }
}

/// Parameters shared by every pairing request
#[must_use]
pub fn base_params(device_name: &str) -> QueryParams {
    vec![
        (params::DEVICE_NAME.to_string(), device_name.to_string()),
        (params::UPDATE_TIMESTAMP.to_string(), "0".to_string()),
        (params::LOCAL_VERSION.to_string(), "0".to_string()),
    ]
}

fn with(mut query: QueryParams, extra: &[(&str, String)]) -> QueryParams {
    query.extend(extra.iter().map(|(k, v)| ((*k).to_string(), v.clone())));
    query
}

/// Step 1 parameters
#[must_use]
pub fn get_server_cert(device_name: &str, salt: &[u8], certificate_pem_hex: &str) -> QueryParams {
    with(
        base_params(device_name),
        &[
            (params::PHRASE, phrases::GET_SERVER_CERT.to_string()),
            (params::SALT, hex_encode(salt)),
            (params::CLIENT_CERT, certificate_pem_hex.to_string()),
        ],
    )
}

/// Step 2 parameters
#[must_use]
pub fn client_challenge(device_name: &str, encrypted_challenge: &[u8]) -> QueryParams {
    with(
        base_params(device_name),
        &[(params::CLIENT_CHALLENGE, hex_encode(encrypted_challenge))],
    )
}

/// Step 3 parameters
#[must_use]
pub fn server_challenge_response(device_name: &str, encrypted_hash: &[u8]) -> QueryParams {
    with(
        base_params(device_name),
        &[(params::SERVER_CHALLENGE_RESP, hex_encode(encrypted_hash))],
    )
}

/// Step 4 parameters
#[must_use]
pub fn client_pairing_secret(device_name: &str, secret_and_signature: &[u8]) -> QueryParams {
    with(
        base_params(device_name),
        &[(params::CLIENT_PAIRING_SECRET, hex_encode(secret_and_signature))],
    )
}

/// Step 5 parameters
#[must_use]
pub fn pair_challenge(device_name: &str) -> QueryParams {
    with(
        base_params(device_name),
        &[(params::PHRASE, phrases::PAIR_CHALLENGE.to_string())],
    )
}
