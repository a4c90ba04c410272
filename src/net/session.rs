//! Authenticated requests after pairing

use std::sync::Arc;
use std::time::Duration;

use super::tls::build_tls_client;
use super::{HttpPairingTransport, PairingRequest, PairingTransport, TlsClientConfig, TransportError};
use crate::identity::ClientIdentity;
use crate::protocol::pairing::{PairingResponse, SERVER_INFO_PATH, UNPAIR_PATH, base_params, names};
use crate::types::{HostAddress, PairingConfig};

/// Builds TLS configurations and sessions from a paired identity
#[derive(Clone)]
pub struct TrustedSessionFactory {
    tls: TlsClientConfig,
    transport: Arc<dyn PairingTransport>,
    device_name: String,
    read_timeout: Duration,
    client_id: Option<String>,
}

impl TrustedSessionFactory {
    /// Client-auth TLS configuration for `identity`
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Tls` if the key or certificate is rejected.
    pub fn build_tls_client(identity: &ClientIdentity) -> Result<TlsClientConfig, TransportError> {
        build_tls_client(identity)
    }

    /// Factory using the HTTP transport
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Tls` if the key or certificate is rejected.
    pub fn new(identity: &ClientIdentity, config: &PairingConfig) -> Result<Self, TransportError> {
        let tls = build_tls_client(identity)?;
        let transport = Arc::new(HttpPairingTransport::new(identity.unique_id(), config));
        Ok(Self::with_transport(tls, transport, config).with_client_id(identity.unique_id()))
    }

    /// Factory over an existing TLS configuration and transport
    pub fn with_transport(
        tls: TlsClientConfig,
        transport: Arc<dyn PairingTransport>,
        config: &PairingConfig,
    ) -> Self {
        Self {
            tls,
            transport,
            device_name: config.device_name.clone(),
            read_timeout: config.step_timeout,
            client_id: None,
        }
    }

    /// Identify as `client_id` on every session request
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The shared TLS configuration
    #[must_use]
    pub fn tls_config(&self) -> TlsClientConfig {
        Arc::clone(&self.tls)
    }

    /// Session against one host
    #[must_use]
    pub fn session(&self, host: &HostAddress) -> TrustedSession {
        TrustedSession {
            host: host.clone(),
            factory: self.clone(),
        }
    }
}

impl std::fmt::Debug for TrustedSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedSessionFactory")
            .field("device_name", &self.device_name)
            .finish_non_exhaustive()
    }
}

/// Authenticated HTTPS requests to a paired host
#[derive(Debug, Clone)]
pub struct TrustedSession {
    host: HostAddress,
    factory: TrustedSessionFactory,
}

impl TrustedSession {
    /// The host this session talks to
    #[must_use]
    pub fn host(&self) -> &HostAddress {
        &self.host
    }

    async fn get(&self, path: &str) -> Result<PairingResponse, TransportError> {
        let request = PairingRequest::pair(
            self.host.host.clone(),
            self.host.https_port,
            base_params(&self.factory.device_name),
        )
        .with_path(path)
        .with_tls(self.factory.tls_config())
        .with_read_timeout(self.factory.read_timeout);
        let request = match &self.factory.client_id {
            Some(id) => request.with_client_id(id.as_str()),
            None => request,
        };

        self.factory.transport.send(&request).await
    }

    /// Fetch `/serverinfo`
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails in transit.
    pub async fn server_info(&self) -> Result<PairingResponse, TransportError> {
        self.get(SERVER_INFO_PATH).await
    }

    /// Whether the host still lists this client as paired
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails in transit.
    pub async fn is_paired(&self) -> Result<bool, TransportError> {
        let info = self.server_info().await?;
        Ok(info.is_success() && info.field(names::PAIR_STATUS) == Some("1"))
    }

    /// Ask the host to forget this client
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails in transit.
    pub async fn unpair(&self) -> Result<PairingResponse, TransportError> {
        let response = self.get(UNPAIR_PATH).await?;
        tracing::info!("Unpair from {} returned {}", self.host, response.status_code);
        Ok(response)
    }
}
