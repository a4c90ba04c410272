//! Mock GameStream host for testing purposes.
//!
//! Listens on two ephemeral ports on `127.0.0.1`: plain HTTP for the
//! handshake and client-certificate HTTPS for confirmation and trusted
//! requests. Every pairing value is computed and verified for real by a
//! [`HostHandshake`].

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use super::host::{HostBehavior, HostHandshake, HostReply};
use crate::identity::{ClientIdentity, generate_unique_id};
use crate::net::crypto_provider;
use crate::protocol::http::{HttpRequest, decode_request};
use crate::protocol::pairing::{PAIR_PATH, PairingStep, SERVER_INFO_PATH, UNPAIR_PATH, names};
use crate::types::HostAddress;

/// Configuration for the mock host.
#[derive(Debug, Clone)]
pub struct MockHostConfig {
    /// PIN the "user" types on the host.
    pub pin: String,
    /// Deviations from a well-behaved host.
    pub behavior: HostBehavior,
    /// Delay before answering step 1, standing in for PIN entry.
    pub pin_entry_delay: Duration,
    /// Host name reported by `/serverinfo`.
    pub hostname: String,
}

impl Default for MockHostConfig {
    fn default() -> Self {
        Self {
            pin: "1234".to_string(),
            behavior: HostBehavior::default(),
            pin_entry_delay: Duration::ZERO,
            hostname: "Mock GameStream Host".to_string(),
        }
    }
}

/// A request as seen by the mock host.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request path.
    pub path: String,
    /// Decoded query parameters.
    pub query: Vec<(String, String)>,
    /// Value of `X-Nv-ClientID`.
    pub client_id: Option<String>,
    /// Whether it arrived over TLS.
    pub tls: bool,
}

impl RecordedRequest {
    /// Look up a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Handshake step this request belongs to.
    #[must_use]
    pub fn step(&self) -> Option<PairingStep> {
        PairingStep::classify(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

struct HostState {
    handshake: HostHandshake,
    requests: Vec<RecordedRequest>,
}

/// A mock GameStream host.
pub struct MockHost {
    config: MockHostConfig,
    identity: Arc<ClientIdentity>,
    state: Arc<Mutex<HostState>>,
    http_addr: SocketAddr,
    https_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl MockHost {
    /// Start a host with the default configuration and the given PIN.
    ///
    /// # Errors
    ///
    /// Returns an error if the listeners cannot be bound or the host
    /// identity cannot be generated.
    pub async fn start_with_pin(pin: &str) -> std::io::Result<Self> {
        Self::start(MockHostConfig {
            pin: pin.to_string(),
            ..MockHostConfig::default()
        })
        .await
    }

    /// Start a host.
    ///
    /// # Errors
    ///
    /// Returns an error if the listeners cannot be bound or the host
    /// identity cannot be generated.
    pub async fn start(config: MockHostConfig) -> std::io::Result<Self> {
        let identity = tokio::task::spawn_blocking(|| ClientIdentity::generate(generate_unique_id()))
            .await
            .map_err(std::io::Error::other)?
            .map_err(std::io::Error::other)?;
        let identity = Arc::new(identity);

        let tls = server_config(&identity).map_err(std::io::Error::other)?;

        let http = TcpListener::bind("127.0.0.1:0").await?;
        let https = TcpListener::bind("127.0.0.1:0").await?;
        let http_addr = http.local_addr()?;
        let https_addr = https.local_addr()?;

        let state = Arc::new(Mutex::new(HostState {
            handshake: HostHandshake::new(
                config.pin.clone(),
                Arc::clone(&identity),
                config.behavior.clone(),
            ),
            requests: Vec::new(),
        }));
        let shutdown = CancellationToken::new();

        let host = Self {
            config,
            identity,
            state,
            http_addr,
            https_addr,
            shutdown,
        };
        host.serve(http, None);
        host.serve(https, Some(TlsAcceptor::from(tls)));

        tracing::debug!("Mock host listening on {} and {}", http_addr, https_addr);
        Ok(host)
    }

    fn serve(&self, listener: TcpListener, tls: Option<TlsAcceptor>) {
        let shutdown = self.shutdown.clone();
        let state = Arc::clone(&self.state);
        let config = self.config.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    result = listener.accept() => {
                        let stream = match result {
                            Ok((stream, _)) => stream,
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                                continue;
                            }
                        };
                        let state = Arc::clone(&state);
                        let config = config.clone();
                        let tls = tls.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, tls, state, config).await {
                                tracing::debug!("Mock host connection ended: {}", e);
                            }
                        });
                    }
                }
            }
        });
    }

    /// Address clients should pair with.
    #[must_use]
    pub fn address(&self) -> HostAddress {
        HostAddress::new("127.0.0.1")
            .with_http_port(self.http_addr.port())
            .with_https_port(self.https_addr.port())
    }

    /// The host's certificate and key.
    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    /// DER of the client certificate the host paired with.
    pub async fn paired_certificate(&self) -> Option<Vec<u8>> {
        self.state
            .lock()
            .await
            .handshake
            .paired_certificate()
            .map(<[u8]>::to_vec)
    }

    /// Stop accepting connections.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    async fn handle_connection(
        stream: TcpStream,
        tls: Option<TlsAcceptor>,
        state: Arc<Mutex<HostState>>,
        config: MockHostConfig,
    ) -> std::io::Result<()> {
        stream.set_nodelay(true)?;

        match tls {
            None => Self::handle_stream(stream, None, &state, &config).await,
            Some(acceptor) => {
                let stream = acceptor.accept(stream).await?;
                let peer = stream
                    .get_ref()
                    .1
                    .peer_certificates()
                    .and_then(|certs| certs.first())
                    .map(|cert| cert.as_ref().to_vec());
                Self::handle_stream(stream, peer, &state, &config).await
            }
        }
    }

    async fn handle_stream<S>(
        mut stream: S,
        peer: Option<Vec<u8>>,
        state: &Mutex<HostState>,
        config: &MockHostConfig,
    ) -> std::io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = Vec::new();
        let mut temp_buf = vec![0u8; 4096];

        let request = loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&temp_buf[..n]);

            match decode_request(&buffer) {
                Ok(Some((request, _))) => break request,
                Ok(None) => {}
                Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            }
        };

        let tls = peer.is_some();
        let step = PairingStep::classify(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let reply = {
            let mut state = state.lock().await;
            state.requests.push(record(&request, tls));
            route(&mut state.handshake, &request, peer.as_deref(), config)
        };

        if step == Some(PairingStep::GetServerCert) && !config.pin_entry_delay.is_zero() {
            tokio::time::sleep(config.pin_entry_delay).await;
        }

        stream.write_all(&encode_http(&reply)).await?;
        stream.flush().await?;
        stream.shutdown().await
    }
}

impl Drop for MockHost {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for MockHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHost")
            .field("http_addr", &self.http_addr)
            .field("https_addr", &self.https_addr)
            .finish_non_exhaustive()
    }
}

fn route(
    handshake: &mut HostHandshake,
    request: &HttpRequest,
    peer: Option<&[u8]>,
    config: &MockHostConfig,
) -> HostReply {
    match request.path.as_str() {
        PAIR_PATH => handshake.handle(&request.query, peer),
        SERVER_INFO_PATH => {
            let status = if handshake.is_paired_peer(peer) { "1" } else { "0" };
            HostReply::ok(&[
                ("hostname", config.hostname.as_str()),
                (names::PAIR_STATUS, status),
            ])
        }
        UNPAIR_PATH => {
            if handshake.is_paired_peer(peer) {
                handshake.unpair();
            }
            HostReply::ok(&[])
        }
        _ => HostReply::error(404, "Not Found"),
    }
}

fn record(request: &HttpRequest, tls: bool) -> RecordedRequest {
    RecordedRequest {
        path: request.path.clone(),
        query: request.query.clone(),
        client_id: request.headers.get("x-nv-clientid").map(str::to_string),
        tls,
    }
}

fn encode_http(reply: &HostReply) -> Vec<u8> {
    let body = reply.to_xml();
    let mut head = String::with_capacity(128);
    let _ = write!(
        head,
        "HTTP/1.1 {} {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status_code,
        reply.status_message,
        body.len()
    );
    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

fn server_config(identity: &ClientIdentity) -> Result<Arc<ServerConfig>, rustls::Error> {
    let provider = crypto_provider();
    let verifier = Arc::new(AcceptAnyClientCert::new(&provider));

    let certificate = CertificateDer::from(identity.certificate_der().to_vec());
    let key_der = identity
        .private_key_der()
        .map_err(|e| rustls::Error::General(e.to_string()))?;
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der.to_vec()));

    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(vec![certificate], key)?;

    Ok(Arc::new(config))
}

/// Requires a client certificate but trusts any
#[derive(Debug)]
struct AcceptAnyClientCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyClientCert {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ClientCertVerifier for AcceptAnyClientCert {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
