use std::fmt;

use crate::error::PairingErrorKind;

/// Progress of a pairing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairState {
    /// Nothing sent yet
    NotPaired,
    /// Host accepted step 1 and is prompting for the PIN
    PinRequested,
    /// Host answered the client challenge
    ChallengeSent,
    /// Host accepted the challenge hash
    SecretExchanged,
    /// Host accepted the pairing secret
    Paired,
    /// Session ended without pairing
    Failed(PairingErrorKind),
}

impl PairState {
    /// Whether the session can make no further progress
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paired | Self::Failed(_))
    }
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPaired => f.write_str("not paired"),
            Self::PinRequested => f.write_str("PIN requested"),
            Self::ChallengeSent => f.write_str("challenge sent"),
            Self::SecretExchanged => f.write_str("secret exchanged"),
            Self::Paired => f.write_str("paired"),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}
