use std::time::Duration;

use thiserror::Error;

use crate::protocol::http::HttpCodecError;

/// Errors moving a request to the host and back
#[derive(Debug, Error)]
pub enum TransportError {
    /// Host string is not a usable name or address
    #[error("invalid host address: {0}")]
    InvalidAddress(String),

    /// TCP connect or TLS handshake took too long
    #[error("connecting to {addr} timed out after {duration:?}")]
    ConnectTimeout {
        /// `host:port` that was dialled
        addr: String,
        /// Configured limit
        duration: Duration,
    },

    /// Connected, but the response never arrived
    #[error("no response from {addr} within {duration:?}")]
    ReadTimeout {
        /// `host:port` that was dialled
        addr: String,
        /// Per-request limit
        duration: Duration,
    },

    /// TLS configuration or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response was not valid HTTP
    #[error("malformed HTTP response: {0}")]
    Http(#[from] HttpCodecError),
}

impl From<rustls::Error> for TransportError {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}
