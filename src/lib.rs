//! # gamestream-pairing
//!
//! Client side of the GameStream/Sunshine PIN pairing handshake.
//!
//! ## Features
//!
//! - Persistent RSA-2048 client identity with a self-signed certificate
//! - The four-step PIN handshake over HTTP, with host-proof verification
//! - Optional `pairchallenge` confirmation over client-certificate TLS
//! - Authenticated `/serverinfo` and `/unpair` requests after pairing
//!
//! ## Example
//!
//! ```rust,no_run
//! use gamestream_pairing::{PairingConfig, PairingStateMachine, Pin};
//!
//! # async fn example() -> Result<(), gamestream_pairing::PairingError> {
//! let config = PairingConfig::builder()
//!     .device_name("Living Room")
//!     .identity_path("/var/lib/gamestream/identity.json")
//!     .build();
//! let host = config.host_address("192.168.1.20");
//! let machine = PairingStateMachine::from_config(config).await?;
//!
//! // Show this to the user; they type it on the host
//! let pin = Pin::generate();
//! println!("Enter {} on the host", pin.as_str());
//!
//! let outcome = machine.pair(&host, &pin).await?;
//! if let Some(warning) = outcome.warning() {
//!     eprintln!("paired, but {warning}");
//! }
//!
//! let session = machine.trusted_sessions(&outcome).session(&host);
//! assert!(session.is_paired().await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **High-level**: `PairingStateMachine` - drives a session end to end
//! - **Mid-level**: `IdentityStore`, `PairingTransport`, `TrustedSessionFactory`
//! - **Low-level**: Protocol modules - sans-IO crypto, HTTP, XML and handshake steps

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Client identity and its persistence
pub mod identity;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod net;
pub mod pairing;
pub mod protocol;

// Re-exports
pub use error::{PairingError, PairingErrorKind};
pub use identity::{ClientIdentity, FileStorage, IdentityStorage, IdentityStore, MemoryStorage};
pub use net::{
    HttpPairingTransport, PairingTransport, TlsClientConfig, TransportError, TrustedSession,
    TrustedSessionFactory, build_tls_client,
};
pub use pairing::{Confirmation, PairingEvent, PairingHandle, PairingOutcome, PairingStateMachine};
pub use protocol::pairing::{PairState, Pin, generate_pin};
pub use types::{HostAddress, PairingConfig, PairingConfigBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        Confirmation, HostAddress, IdentityStore, PairState, PairingConfig, PairingError,
        PairingEvent, PairingOutcome, PairingStateMachine, Pin, TrustedSession,
        TrustedSessionFactory, generate_pin,
    };
}
