//! Decoded host responses

use crate::protocol::http::{HttpResponse, StatusCode};
use crate::protocol::xml::{Fields, decode_fields};

/// Field names the host uses in its response documents
pub mod names {
    /// Root attribute overriding the HTTP status code
    pub const STATUS_CODE: &str = "status_code";
    /// Root attribute overriding the HTTP reason phrase
    pub const STATUS_MESSAGE: &str = "status_message";
    /// `1` when the host accepted the step
    pub const PAIRED: &str = "paired";
    /// Hex of the host certificate PEM (step 1)
    pub const PLAIN_CERT: &str = "plaincert";
    /// Encrypted `server_hash ∥ server_challenge` (step 2)
    pub const CHALLENGE_RESPONSE: &str = "challengeresponse";
    /// Hex of `server_secret ∥ signature` (step 3)
    pub const PAIRING_SECRET: &str = "pairingsecret";
    /// Pair status in `/serverinfo`
    pub const PAIR_STATUS: &str = "PairStatus";
}

/// A host response reduced to status and fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingResponse {
    /// Effective status code
    pub status_code: u16,
    /// Effective status message
    pub status_message: String,
    /// Flattened body fields
    pub fields: Fields,
    /// Body as received
    pub raw_body: String,
}

impl PairingResponse {
    /// Build from a transport status line and a raw body
    ///
    /// `status_code`/`status_message` attributes in the body take precedence
    /// over the transport values.
    #[must_use]
    pub fn from_parts(status: u16, reason: &str, body: impl Into<String>) -> Self {
        let raw_body = body.into();
        let fields = decode_fields(&raw_body);

        let status_code = fields
            .get(names::STATUS_CODE)
            .and_then(|code| code.trim().parse::<u16>().ok())
            .unwrap_or(status);
        let status_message = fields
            .get(names::STATUS_MESSAGE)
            .unwrap_or(reason)
            .to_string();

        Self {
            status_code,
            status_message,
            fields,
            raw_body,
        }
    }

    /// Decode an HTTP response
    #[must_use]
    pub fn from_http(response: &HttpResponse) -> Self {
        Self::from_parts(
            response.status.as_u16(),
            &response.reason,
            response.body_text(),
        )
    }

    /// Whether the effective status is 200
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == StatusCode::OK.as_u16()
    }

    /// Whether the host reported `paired=1`
    #[must_use]
    pub fn paired(&self) -> bool {
        self.field(names::PAIRED) == Some("1")
    }

    /// Look up a body field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }
}
