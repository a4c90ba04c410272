//! In-process transports for driving the state machine without sockets

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::host::{HostHandshake, HostReply};
use crate::net::{PairingRequest, PairingTransport, TransportError};
use crate::protocol::pairing::PairingResponse;
use crate::protocol::xml::encode_response;

type Responder =
    Box<dyn FnOnce(&PairingRequest) -> Result<PairingResponse, TransportError> + Send>;

/// Replays canned responses in order and records every request
///
/// Running out of script answers with a connection-refused error.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Responder>>,
    requests: Mutex<Vec<PairingRequest>>,
}

impl ScriptedTransport {
    /// Empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fixed response
    #[must_use]
    pub fn respond(self, response: PairingResponse) -> Self {
        self.respond_with(move |_| Ok(response))
    }

    /// Queue a 200 response with `paired` set accordingly
    #[must_use]
    pub fn respond_paired(self, paired: bool) -> Self {
        self.respond(HostReply::paired(paired).to_response())
    }

    /// Queue a response computed from the request
    ///
    /// The closure sees the request before the transport adds `uniqueid`.
    #[must_use]
    pub fn respond_with<F>(mut self, responder: F) -> Self
    where
        F: FnOnce(&PairingRequest) -> Result<PairingResponse, TransportError> + Send + 'static,
    {
        self.script.get_mut().push_back(Box::new(responder));
        self
    }

    /// Queue a transport failure
    #[must_use]
    pub fn fail(self, error: TransportError) -> Self {
        self.respond_with(move |_| Err(error))
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<PairingRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of responses not yet used
    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl PairingTransport for ScriptedTransport {
    async fn send(&self, request: &PairingRequest) -> Result<PairingResponse, TransportError> {
        self.requests.lock().await.push(request.clone());

        let responder = self.script.lock().await.pop_front();
        match responder {
            Some(responder) => responder(request),
            None => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "script exhausted",
            ))),
        }
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport").finish_non_exhaustive()
    }
}

/// Routes `/pair` requests straight into a [`HostHandshake`]
///
/// Requests marked for TLS are treated as coming from the paired client,
/// since no certificate is exchanged in process.
pub struct LoopbackTransport {
    host: Mutex<HostHandshake>,
}

impl LoopbackTransport {
    /// Serve `host`
    #[must_use]
    pub fn new(host: HostHandshake) -> Self {
        Self {
            host: Mutex::new(host),
        }
    }

    /// DER of the client certificate the host paired with
    pub async fn paired_certificate(&self) -> Option<Vec<u8>> {
        self.host.lock().await.paired_certificate().map(<[u8]>::to_vec)
    }
}

#[async_trait]
impl PairingTransport for LoopbackTransport {
    async fn send(&self, request: &PairingRequest) -> Result<PairingResponse, TransportError> {
        let mut host = self.host.lock().await;
        let peer = if request.uses_tls() {
            host.paired_certificate().map(<[u8]>::to_vec)
        } else {
            None
        };
        let reply = host.handle(&request.params, peer.as_deref());
        Ok(reply.to_response())
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport").finish_non_exhaustive()
    }
}

/// Decode a host document with an explicit status, as the transport would
#[must_use]
pub fn host_response(status_code: u16, status_message: &str, fields: &[(&str, &str)]) -> PairingResponse {
    PairingResponse::from_parts(
        status_code,
        status_message,
        encode_response(status_code, status_message, fields),
    )
}
