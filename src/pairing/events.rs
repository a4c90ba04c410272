use crate::error::PairingErrorKind;
use crate::protocol::pairing::PairState;
use crate::types::HostAddress;

/// Pairing progress notifications
#[derive(Debug, Clone)]
pub enum PairingEvent {
    /// A session moved to a new state
    StateChanged {
        /// The host being paired
        host: HostAddress,
        /// The previous state
        old: PairState,
        /// The new state
        new: PairState,
    },
    /// The host accepted every mandatory step
    Paired {
        /// The paired host
        host: HostAddress,
    },
    /// The session ended without pairing
    Failed {
        /// The host being paired
        host: HostAddress,
        /// Taxonomy case
        kind: PairingErrorKind,
        /// Human-readable message
        message: String,
    },
    /// Non-fatal problem after pairing, such as a failed TLS confirmation
    Warning {
        /// The host being paired
        host: HostAddress,
        /// Description of the problem
        message: String,
    },
}
