use crate::net::TlsClientConfig;
use crate::protocol::pairing::PairState;
use crate::types::HostAddress;

/// Result of the optional TLS confirmation round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Host answered `paired=1` over TLS
    Confirmed,
    /// Disabled by configuration
    Skipped,
    /// Round failed; pairing still stands
    Failed(String),
}

/// A successful pairing
#[derive(Debug, Clone)]
pub struct PairingOutcome {
    /// The paired host
    pub host: HostAddress,
    /// Always `PairState::Paired`
    pub state: PairState,
    /// Client identifier the host now trusts
    pub unique_id: String,
    /// Outcome of the TLS confirmation
    pub confirmation: Confirmation,
    /// Whether the host proved knowledge of the PIN
    pub host_proof_verified: bool,
    /// Client-auth TLS configuration for later requests
    pub tls_config: TlsClientConfig,
}

impl PairingOutcome {
    /// Warning to surface to the user, if any
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match &self.confirmation {
            Confirmation::Failed(message) => Some(message),
            Confirmation::Confirmed | Confirmation::Skipped => None,
        }
    }
}
