use std::fmt;

use thiserror::Error;

use crate::identity::IdentityError;
use crate::net::TransportError;
use crate::protocol::crypto::CryptoError;

/// Errors that end a pairing session
///
/// Every variant is terminal for the session that produced it. Starting over
/// means a new session with a fresh salt, and usually a fresh PIN.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The host could not be reached or the exchange failed in transit
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// The host answered with a missing or malformed field
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the problem
        message: String,
    },

    /// The host and client derived different session keys
    #[error("PIN mismatch: {message}")]
    PinMismatch {
        /// Description of the step that failed
        message: String,
    },

    /// The host declined to start pairing
    #[error("pairing rejected: {message}")]
    Rejected {
        /// Status message reported by the host
        message: String,
    },

    /// Client key or certificate could not be produced or used
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// The caller abandoned the session
    #[error("pairing cancelled")]
    Cancelled,
}

impl PairingError {
    /// Protocol violation with a message
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// PIN mismatch with a message
    pub fn pin_mismatch(message: impl Into<String>) -> Self {
        Self::PinMismatch {
            message: message.into(),
        }
    }

    /// Rejection with a message
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// The taxonomy case of this error
    #[must_use]
    pub fn kind(&self) -> PairingErrorKind {
        match self {
            Self::Network(_) => PairingErrorKind::Network,
            Self::Protocol { .. } => PairingErrorKind::Protocol,
            Self::PinMismatch { .. } => PairingErrorKind::PinMismatch,
            Self::Rejected { .. } => PairingErrorKind::Rejected,
            Self::Identity(_) => PairingErrorKind::Identity,
            Self::Cancelled => PairingErrorKind::Cancelled,
        }
    }
}

/// Crypto failures while processing host data mean the host sent garbage
impl From<CryptoError> for PairingError {
    fn from(err: CryptoError) -> Self {
        Self::protocol(err.to_string())
    }
}

/// Failure reasons without their payload, carried by `PairState::Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingErrorKind {
    /// Unreachable host, timeout, TLS or HTTP failure
    Network,
    /// Missing or malformed field
    Protocol,
    /// Wrong PIN
    PinMismatch,
    /// Host declined step 1
    Rejected,
    /// Key, certificate or signing failure
    Identity,
    /// Abandoned by the caller
    Cancelled,
}

impl fmt::Display for PairingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network_error",
            Self::Protocol => "protocol_error",
            Self::PinMismatch => "pin_mismatch",
            Self::Rejected => "rejected",
            Self::Identity => "identity_error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result type alias for pairing operations
pub type Result<T> = std::result::Result<T, PairingError>;
