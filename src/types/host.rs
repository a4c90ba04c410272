use std::fmt;
use std::net::IpAddr;

use super::config::{DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT};

/// Where a host listens, as handed over by discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddress {
    /// Hostname or IP literal, without brackets
    pub host: String,
    /// Unauthenticated pairing port
    pub http_port: u16,
    /// Client-certificate port
    pub https_port: u16,
}

impl HostAddress {
    /// Host on the default ports
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(str::to_string)
            .unwrap_or(host);

        Self {
            host,
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
        }
    }

    /// Override the HTTP port
    #[must_use]
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Override the HTTPS port
    #[must_use]
    pub fn with_https_port(mut self, port: u16) -> Self {
        self.https_port = port;
        self
    }

    /// Whether the host is an IPv6 literal
    #[must_use]
    pub fn is_ipv6(&self) -> bool {
        matches!(self.host.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
    }

    /// `host:port`, bracketing IPv6 literals
    #[must_use]
    pub fn authority(&self, port: u16) -> String {
        if self.is_ipv6() {
            format!("[{}]:{port}", self.host)
        } else {
            format!("{}:{port}", self.host)
        }
    }
}

impl From<IpAddr> for HostAddress {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr.to_string())
    }
}

impl From<&str> for HostAddress {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]", self.host)
        } else {
            f.write_str(&self.host)
        }
    }
}
