//! Core types module

mod config;
mod host;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT, PairingConfig, PairingConfigBuilder};
pub use host::HostAddress;
