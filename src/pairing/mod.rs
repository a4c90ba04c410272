//! Pairing orchestration
//!
//! [`PairingStateMachine`] runs the four mandatory round trips of a
//! [`PairingSession`](crate::protocol::pairing::PairingSession) over a
//! [`PairingTransport`](crate::net::PairingTransport), publishes progress as
//! [`PairingEvent`]s and, when configured, confirms the result over TLS.

mod events;
mod machine;
mod outcome;


pub use events::PairingEvent;
pub use machine::{PairingHandle, PairingStateMachine};
pub use outcome::{Confirmation, PairingOutcome};
