use std::fmt::Write;

use super::{Headers, headers::names};

/// An HTTP GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request path (e.g. "/pair")
    pub path: String,
    /// Query parameters, encoded in order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: Headers,
}

impl HttpRequest {
    /// Create a new GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
            headers: Headers::new(),
        }
    }

    /// Create a builder for constructing requests
    pub fn builder(path: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(path)
    }

    /// Path plus percent-encoded query string
    #[must_use]
    pub fn target(&self) -> String {
        let mut target = self.path.clone();
        for (i, (name, value)) in self.query.iter().enumerate() {
            target.push(if i == 0 { '?' } else { '&' });
            target.push_str(&percent_encode(name));
            target.push('=');
            target.push_str(&percent_encode(value));
        }
        target
    }

    /// Look up a query parameter by name
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Encode request to bytes
    ///
    /// Returns the complete request ready for transmission
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut output = String::with_capacity(256);

        // Request line: GET target HTTP/1.1\r\n
        let _ = write!(output, "GET {} HTTP/1.1\r\n", self.target());

        for (name, value) in self.headers.iter() {
            let _ = write!(output, "{name}: {value}\r\n");
        }

        output.push_str("\r\n");
        output.into_bytes()
    }
}

/// Builder for HTTP requests
#[derive(Debug)]
pub struct HttpRequestBuilder {
    request: HttpRequest,
}

impl HttpRequestBuilder {
    /// Create a new builder
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            request: HttpRequest::get(path),
        }
    }

    /// Append a query parameter
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((name.into(), value.into()));
        self
    }

    /// Append several query parameters
    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.request
            .query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    /// Set the Host header, bracketing IPv6 literals
    #[must_use]
    pub fn host(self, host: &str, port: u16) -> Self {
        let value = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        self.header(names::HOST, value)
    }

    /// Build the request
    #[must_use]
    pub fn build(self) -> HttpRequest {
        self.request
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set
#[must_use]
pub fn percent_encode(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            output.push(byte as char);
        } else {
            let _ = write!(output, "%{byte:02X}");
        }
    }
    output
}

/// Decode `%XX` escapes; `+` is left alone
#[must_use]
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                output.push(byte);
                i += 3;
                continue;
            }
        }
        output.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&output).into_owned()
}
