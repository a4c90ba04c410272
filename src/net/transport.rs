//! Request/response transport for the pairing endpoints

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::{TlsClientConfig, TransportError};
use crate::protocol::http::{HttpCodec, HttpRequest, HttpResponse, headers::names};
use crate::protocol::pairing::{PAIR_PATH, PairingResponse, QueryParams, params};
use crate::types::PairingConfig;

/// Plain HTTP or client-certificate HTTPS
#[derive(Debug, Clone)]
pub enum Scheme {
    /// Unauthenticated port
    Http,
    /// Client-certificate port
    Https(TlsClientConfig),
}

/// One GET to the host
#[derive(Debug, Clone)]
pub struct PairingRequest {
    /// Hostname or IP literal, without brackets
    pub host: String,
    /// Destination port
    pub port: u16,
    /// Endpoint path
    pub path: String,
    /// Query parameters, excluding `uniqueid`
    pub params: QueryParams,
    /// Transport security
    pub scheme: Scheme,
    /// How long to wait for the response once connected
    pub read_timeout: Duration,
    /// Client identifier for this request; the transport's default when unset
    pub client_id: Option<String>,
}

impl PairingRequest {
    /// Plain HTTP request to `/pair`
    pub fn pair(host: impl Into<String>, port: u16, params: QueryParams) -> Self {
        Self {
            host: host.into(),
            port,
            path: PAIR_PATH.to_string(),
            params,
            scheme: Scheme::Http,
            read_timeout: Duration::from_secs(10),
            client_id: None,
        }
    }

    /// Identify as `client_id` instead of the transport's default
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Send over HTTPS with the given client configuration
    #[must_use]
    pub fn with_tls(mut self, config: TlsClientConfig) -> Self {
        self.scheme = Scheme::Https(config);
        self
    }

    /// Use another endpoint path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Whether the request goes over TLS
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        matches!(self.scheme, Scheme::Https(_))
    }

    /// Look up a query parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends pairing requests and decodes the host's answers
#[async_trait]
pub trait PairingTransport: Send + Sync {
    /// Perform one request/response exchange
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the host cannot be reached, the exchange
    /// times out, or the response is not HTTP.
    async fn send(&self, request: &PairingRequest) -> Result<PairingResponse, TransportError>;
}

/// HTTP/1.1 over TCP, with optional rustls
///
/// Each request uses a fresh connection with `Connection: close`. Requests
/// that carry their own client id use it; the id given at construction is
/// only the fallback, so a regenerated identity takes effect immediately.
#[derive(Debug, Clone)]
pub struct HttpPairingTransport {
    unique_id: String,
    connect_timeout: Duration,
    max_response_size: usize,
}

impl HttpPairingTransport {
    /// Create a transport identifying as `unique_id`
    pub fn new(unique_id: impl Into<String>, config: &PairingConfig) -> Self {
        Self {
            unique_id: unique_id.into(),
            connect_timeout: config.connect_timeout,
            max_response_size: config.max_response_size,
        }
    }

    /// Client identifier for requests that do not carry their own
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn build_request(&self, request: &PairingRequest) -> HttpRequest {
        let client_id = request.client_id.as_deref().unwrap_or(&self.unique_id);

        HttpRequest::builder(request.path.as_str())
            .param(params::UNIQUE_ID, client_id)
            .params(request.params.iter().cloned())
            .host(&request.host, request.port)
            .header(names::USER_AGENT, concat!("gamestream-pairing/", env!("CARGO_PKG_VERSION")))
            .header(names::X_NV_CLIENT_ID, client_id)
            .header(names::CONNECTION, "close")
            .build()
    }

    async fn connect(&self, request: &PairingRequest) -> Result<TcpStream, TransportError> {
        let addr = authority(request);
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((request.host.as_str(), request.port)),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            addr: addr.clone(),
            duration: self.connect_timeout,
        })??;

        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn exchange<S>(&self, mut stream: S, request: &[u8]) -> Result<HttpResponse, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream.write_all(request).await?;
        stream.flush().await?;

        let mut codec = HttpCodec::new().with_max_size(self.max_response_size);
        let mut buf = vec![0u8; 4096];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                // Hosts commonly close TLS without close_notify
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => 0,
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                return Ok(codec.finish()?);
            }

            codec.feed(&buf[..n])?;
            if let Some(response) = codec.decode()? {
                return Ok(response);
            }
        }
    }

    async fn read_with_timeout<S>(
        &self,
        stream: S,
        bytes: &[u8],
        request: &PairingRequest,
    ) -> Result<HttpResponse, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tokio::time::timeout(request.read_timeout, self.exchange(stream, bytes))
            .await
            .map_err(|_| TransportError::ReadTimeout {
                addr: authority(request),
                duration: request.read_timeout,
            })?
    }
}

#[async_trait]
impl PairingTransport for HttpPairingTransport {
    async fn send(&self, request: &PairingRequest) -> Result<PairingResponse, TransportError> {
        let bytes = self.build_request(request).encode();

        tracing::debug!(
            "GET {} to {} ({})",
            request.path,
            authority(request),
            if request.uses_tls() { "https" } else { "http" }
        );

        let stream = self.connect(request).await?;

        let response = match &request.scheme {
            Scheme::Http => self.read_with_timeout(stream, &bytes, request).await?,
            Scheme::Https(config) => {
                let server_name = ServerName::try_from(request.host.clone())
                    .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;
                let connector = TlsConnector::from(Arc::clone(config));

                let tls = tokio::time::timeout(self.connect_timeout, connector.connect(server_name, stream))
                    .await
                    .map_err(|_| TransportError::ConnectTimeout {
                        addr: authority(request),
                        duration: self.connect_timeout,
                    })?
                    .map_err(|e| TransportError::Tls(e.to_string()))?;

                self.read_with_timeout(tls, &bytes, request).await?
            }
        };

        tracing::debug!("Response {} from {}", response.status.as_u16(), authority(request));
        Ok(PairingResponse::from_http(&response))
    }
}

fn authority(request: &PairingRequest) -> String {
    if request.host.contains(':') {
        format!("[{}]:{}", request.host, request.port)
    } else {
        format!("{}:{}", request.host, request.port)
    }
}
