use super::{Headers, HttpRequest, HttpResponse, StatusCode, request::percent_decode};
use thiserror::Error;

/// Errors during HTTP parsing
#[derive(Debug, Error)]
pub enum HttpCodecError {
    #[error("connection closed before the response was complete")]
    Truncated,

    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// How the end of the body is found
#[derive(Debug, Clone, Copy)]
enum BodyFraming {
    Length(usize),
    Chunked,
    UntilClose,
}

#[derive(Debug, Clone)]
enum ParseState {
    /// Waiting for status line
    StatusLine,
    /// Parsing headers
    Headers {
        version: String,
        status: StatusCode,
        reason: String,
    },
    /// Reading body
    Body {
        version: String,
        status: StatusCode,
        reason: String,
        headers: Headers,
        framing: BodyFraming,
        /// De-chunked body collected so far
        collected: Vec<u8>,
    },
}

/// Sans-IO HTTP/1.1 codec for parsing responses
///
/// Feed bytes with `feed()`, check for complete responses with `decode()`,
/// and call `finish()` once the peer closes the connection: the host answers
/// with `Connection: close` and may omit `Content-Length`.
pub struct HttpCodec {
    /// Internal buffer for partial data
    buffer: Vec<u8>,
    /// Maximum response size
    max_size: usize,
    /// Total bytes fed so far
    received: usize,
    /// Parser state
    state: ParseState,
}

impl HttpCodec {
    /// Create a new codec
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_size: 64 * 1024,
            received: 0,
            state: ParseState::StatusLine,
        }
    }

    /// Set maximum response size
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Feed bytes into the codec
    ///
    /// # Errors
    /// Returns `HttpCodecError::ResponseTooLarge` once more than `max_size` bytes were fed.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), HttpCodecError> {
        self.received += bytes.len();
        if self.received > self.max_size {
            return Err(HttpCodecError::ResponseTooLarge {
                size: self.received,
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Try to decode a complete response
    ///
    /// Returns `Ok(Some(response))` if a complete response is available,
    /// `Ok(None)` if more data is needed.
    ///
    /// # Errors
    /// Returns `HttpCodecError` if the response is malformed.
    pub fn decode(&mut self) -> Result<Option<HttpResponse>, HttpCodecError> {
        loop {
            match &mut self.state {
                ParseState::StatusLine => {
                    let Some(line_end) = find_line_end(&self.buffer) else {
                        return Ok(None);
                    };
                    let line = String::from_utf8_lossy(&self.buffer[..line_end]).to_string();
                    let (version, status, reason) = parse_status_line(&line)?;
                    self.buffer.drain(..line_end + 2);

                    self.state = ParseState::Headers {
                        version,
                        status,
                        reason,
                    };
                }

                ParseState::Headers {
                    version,
                    status,
                    reason,
                } => {
                    let Some((headers, body_start)) = parse_headers(&self.buffer)? else {
                        return Ok(None);
                    };
                    self.buffer.drain(..body_start);

                    let framing = if headers.is_chunked() {
                        BodyFraming::Chunked
                    } else if let Some(length) = headers.content_length() {
                        BodyFraming::Length(length)
                    } else if status.0 == 204 || status.0 == 304 {
                        BodyFraming::Length(0)
                    } else {
                        BodyFraming::UntilClose
                    };

                    self.state = ParseState::Body {
                        version: std::mem::take(version),
                        status: *status,
                        reason: std::mem::take(reason),
                        headers,
                        framing,
                        collected: Vec::new(),
                    };
                }

                ParseState::Body {
                    framing, collected, ..
                } => {
                    match *framing {
                        BodyFraming::Length(length) => {
                            if self.buffer.len() < length {
                                return Ok(None);
                            }
                            collected.extend(self.buffer.drain(..length));
                        }
                        BodyFraming::Chunked => {
                            if read_chunks(&mut self.buffer, collected)?.is_none() {
                                return Ok(None);
                            }
                        }
                        BodyFraming::UntilClose => return Ok(None),
                    }

                    return Ok(Some(self.take_response()));
                }
            }
        }
    }

    /// Signal end of stream
    ///
    /// Completes a close-delimited body; any other partial response is an error.
    ///
    /// # Errors
    /// Returns `HttpCodecError::Truncated` if the response was cut short.
    pub fn finish(&mut self) -> Result<HttpResponse, HttpCodecError> {
        if let Some(response) = self.decode()? {
            return Ok(response);
        }

        match &mut self.state {
            ParseState::Body {
                framing: BodyFraming::UntilClose,
                collected,
                ..
            } => {
                collected.append(&mut self.buffer);
                Ok(self.take_response())
            }
            _ => Err(HttpCodecError::Truncated),
        }
    }

    /// Clear the codec buffer and reset state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.received = 0;
        self.state = ParseState::StatusLine;
    }

    /// Get current buffer length
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn take_response(&mut self) -> HttpResponse {
        let state = std::mem::replace(&mut self.state, ParseState::StatusLine);
        match state {
            ParseState::Body {
                version,
                status,
                reason,
                headers,
                collected,
                ..
            } => HttpResponse {
                version,
                status,
                reason,
                headers,
                body: collected,
            },
            // only called from the Body state
            _ => unreachable!("take_response outside body state"),
        }
    }
}

impl Default for HttpCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a GET request head from the start of `buffer`
///
/// Returns the request and the number of bytes it occupied, or `None` if the
/// head is not complete yet. Used by the in-crate mock host.
///
/// # Errors
/// Returns `HttpCodecError` if the request line or a header is malformed.
pub fn decode_request(buffer: &[u8]) -> Result<Option<(HttpRequest, usize)>, HttpCodecError> {
    let Some(line_end) = find_line_end(buffer) else {
        return Ok(None);
    };
    let line = String::from_utf8_lossy(&buffer[..line_end]).to_string();

    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpCodecError::InvalidRequestLine(line));
    };
    if !version.starts_with("HTTP/") || method.is_empty() {
        return Err(HttpCodecError::InvalidRequestLine(line));
    }

    let rest = &buffer[line_end + 2..];
    let Some((headers, head_len)) = parse_headers(rest)? else {
        return Ok(None);
    };

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect();

    let request = HttpRequest {
        path: percent_decode(path),
        query,
        headers,
    };
    Ok(Some((request, line_end + 2 + head_len)))
}

fn find_line_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
}

fn parse_status_line(line: &str) -> Result<(String, StatusCode, String), HttpCodecError> {
    // Format: "HTTP/1.1 200 OK"
    let mut parts = line.splitn(3, ' ');

    let version = parts
        .next()
        .filter(|v| v.starts_with("HTTP/"))
        .ok_or_else(|| HttpCodecError::InvalidStatusLine(line.to_string()))?
        .to_string();

    let status = parts
        .next()
        .ok_or_else(|| HttpCodecError::InvalidStatusLine(line.to_string()))?
        .parse::<u16>()
        .map_err(|_| HttpCodecError::InvalidStatusLine(line.to_string()))?;

    let reason = parts.next().unwrap_or("").to_string();

    Ok((version, StatusCode(status), reason))
}

fn parse_headers(buffer: &[u8]) -> Result<Option<(Headers, usize)>, HttpCodecError> {
    // Check for empty headers (just a blank line)
    if buffer.starts_with(b"\r\n") {
        return Ok(Some((Headers::new(), 2)));
    }

    let Some(header_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Ok(None);
    };

    let header_str = String::from_utf8_lossy(&buffer[..header_end]);
    let mut headers = Headers::new();

    for line in header_str.split("\r\n") {
        if line.is_empty() {
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpCodecError::InvalidHeader(line.to_string()))?;

        headers.insert(name.trim(), value.trim());
    }

    // +4 for the \r\n\r\n
    Ok(Some((headers, header_end + 4)))
}

/// Move complete chunks from `buffer` into `body`
///
/// `Some(())` once the terminating zero-size chunk and its trailer are consumed.
fn read_chunks(buffer: &mut Vec<u8>, body: &mut Vec<u8>) -> Result<Option<()>, HttpCodecError> {
    loop {
        let Some(line_end) = find_line_end(buffer) else {
            return Ok(None);
        };
        let size_line = String::from_utf8_lossy(&buffer[..line_end]).to_string();
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| HttpCodecError::InvalidChunkSize(size_line.clone()))?;

        if size == 0 {
            // Trailer section ends with an empty line
            let trailer = &buffer[line_end + 2..];
            if trailer.starts_with(b"\r\n") {
                buffer.drain(..line_end + 4);
                return Ok(Some(()));
            }
            let Some(end) = trailer.windows(4).position(|w| w == b"\r\n\r\n") else {
                return Ok(None);
            };
            buffer.drain(..line_end + 2 + end + 4);
            return Ok(Some(()));
        }

        let data_start = line_end + 2;
        if buffer.len() < data_start + size + 2 {
            return Ok(None);
        }
        body.extend_from_slice(&buffer[data_start..data_start + size]);
        buffer.drain(..data_start + size + 2);
    }
}
