use std::path::PathBuf;
use std::time::Duration;

use super::HostAddress;

/// Default unauthenticated pairing port
pub const DEFAULT_HTTP_PORT: u16 = 47989;
/// Default client-certificate port
pub const DEFAULT_HTTPS_PORT: u16 = 47984;

/// Configuration for pairing behavior
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Name the host shows for this client (default: "gamestream-pairing")
    pub device_name: String,

    /// Unauthenticated HTTP port (default: 47989)
    pub http_port: u16,

    /// Client-certificate HTTPS port (default: 47984)
    pub https_port: u16,

    /// Timeout for TCP connect and TLS handshake (default: 10 seconds)
    pub connect_timeout: Duration,

    /// Read timeout for step 1, while the host waits on its PIN prompt
    /// (default: 120 seconds)
    pub pin_entry_timeout: Duration,

    /// Read timeout for every later step (default: 10 seconds)
    pub step_timeout: Duration,

    /// Attempt the `pairchallenge` confirmation over TLS (default: true)
    pub confirm_over_tls: bool,

    /// Path of the persisted identity (None = in memory only)
    pub identity_path: Option<PathBuf>,

    /// Largest response accepted from the host (default: 64 KiB)
    pub max_response_size: usize,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            device_name: "gamestream-pairing".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            connect_timeout: Duration::from_secs(10),
            pin_entry_timeout: Duration::from_secs(120),
            step_timeout: Duration::from_secs(10),
            confirm_over_tls: true,
            identity_path: None,
            max_response_size: 64 * 1024,
        }
    }
}

impl PairingConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> PairingConfigBuilder {
        PairingConfigBuilder::default()
    }

    /// Address of `host` on the configured ports
    #[must_use]
    pub fn host_address(&self, host: impl Into<String>) -> HostAddress {
        HostAddress::new(host)
            .with_http_port(self.http_port)
            .with_https_port(self.https_port)
    }
}

/// Builder for `PairingConfig`
#[derive(Debug, Clone, Default)]
pub struct PairingConfigBuilder {
    config: PairingConfig,
}

impl PairingConfigBuilder {
    /// Set the device name shown on the host
    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    /// Set the HTTP port
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Set the HTTPS port
    #[must_use]
    pub fn https_port(mut self, port: u16) -> Self {
        self.config.https_port = port;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the step 1 read timeout
    #[must_use]
    pub fn pin_entry_timeout(mut self, timeout: Duration) -> Self {
        self.config.pin_entry_timeout = timeout;
        self
    }

    /// Set the read timeout for steps 2 onwards
    #[must_use]
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout = timeout;
        self
    }

    /// Enable or skip the TLS confirmation round
    #[must_use]
    pub fn confirm_over_tls(mut self, enable: bool) -> Self {
        self.config.confirm_over_tls = enable;
        self
    }

    /// Persist the identity at `path`
    #[must_use]
    pub fn identity_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.identity_path = Some(path.into());
        self
    }

    /// Set the response size limit
    #[must_use]
    pub fn max_response_size(mut self, size: usize) -> Self {
        self.config.max_response_size = size;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> PairingConfig {
        self.config
    }
}
