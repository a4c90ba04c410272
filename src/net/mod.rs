//! Network layer: HTTP(S) transport and authenticated sessions

mod error;
mod session;
mod tls;
mod transport;


pub use error::TransportError;
pub use session::{TrustedSession, TrustedSessionFactory};
pub use tls::{TlsClientConfig, build_tls_client};
pub(crate) use tls::crypto_provider;
pub use transport::{HttpPairingTransport, PairingRequest, PairingTransport, Scheme};
