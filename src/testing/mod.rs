//! Test doubles for the host side of pairing
//!
//! [`MockHost`] is a real TCP/TLS server; [`ScriptedTransport`] and
//! [`LoopbackTransport`] drive the state machine in process.

pub mod host;
pub mod mock_host;
pub mod transport;

#[cfg(test)]
mod tests;

pub use host::{HostBehavior, HostHandshake, HostReply};
pub use mock_host::{MockHost, MockHostConfig, RecordedRequest};
pub use transport::{LoopbackTransport, ScriptedTransport, host_response};
