//! Sans-IO HTTP/1.1-shaped server codec.
//!
//! Mirrors the buffer-fed `feed()`/`decode()` shape used elsewhere in this
//! crate for framing wire protocols: no I/O happens here, callers push in
//! bytes read off the socket and pull parsed requests back out.

use super::{Headers, HttpResponse, Method, StatusCode, parse_path_and_query};
use bytes::BytesMut;
use std::str::{self, FromStr};

use super::HttpRequest;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("body too large: {size} > {max}")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid UTF-8 in headers")]
    InvalidUtf8,
}

/// Generous but bounded: the largest legitimate body is a `/accessories`
/// `PUT` batch or the full accessory database dump, neither of which
/// approaches this (§5, §7 hostile-input hardening).
const MAX_BODY_SIZE: usize = 1024 * 1024;
const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Parses inbound HTTP-shaped requests and builds outbound responses.
pub struct HttpServerCodec {
    buffer: BytesMut,
}

impl HttpServerCodec {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Attempt to decode one complete request out of the buffer.
    ///
    /// # Errors
    /// Returns `ParseError` if the buffered bytes are malformed; the
    /// caller should reply `400 Bad Request` and close the session (§5,
    /// §7).
    pub fn decode(&mut self) -> Result<Option<HttpRequest>, ParseError> {
        let Some(header_end) = find_header_end(&self.buffer) else {
            if self.buffer.len() > MAX_HEADER_SIZE {
                return Err(ParseError::InvalidHeader("headers too large".into()));
            }
            return Ok(None);
        };

        let header_bytes = &self.buffer[..header_end];
        let header_str = str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidUtf8)?;
        let (method, uri, headers) = parse_headers(header_str)?;

        let content_length = headers
            .get("Content-Length")
            .map(str::parse::<usize>)
            .transpose()
            .map_err(|_| ParseError::InvalidContentLength("not a number".into()))?
            .unwrap_or(0);

        if content_length > MAX_BODY_SIZE {
            return Err(ParseError::BodyTooLarge {
                size: content_length,
                max: MAX_BODY_SIZE,
            });
        }

        let total_size = header_end + 4 + content_length;
        if self.buffer.len() < total_size {
            return Ok(None);
        }

        let _ = self.buffer.split_to(header_end + 4);
        let body = if content_length > 0 {
            self.buffer.split_to(content_length).to_vec()
        } else {
            Vec::new()
        };

        let (path, query) = parse_path_and_query(&uri);
        Ok(Some(HttpRequest {
            method,
            path,
            query,
            headers,
            body,
        }))
    }
}

impl Default for HttpServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find_header_end(buf: &BytesMut) -> Option<usize> {
    let needle = b"\r\n\r\n";
    buf.windows(needle.len()).position(|w| w == needle)
}

fn parse_headers(header_str: &str) -> Result<(Method, String, Headers), ParseError> {
    let mut lines = header_str.lines();

    let request_line = lines
        .next()
        .ok_or_else(|| ParseError::InvalidRequestLine("empty request".into()))?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::InvalidRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0]).map_err(|()| ParseError::InvalidMethod(parts[0].to_string()))?;
    let uri = parts[1].to_string();

    if !parts[2].starts_with("HTTP/") {
        return Err(ParseError::InvalidRequestLine(format!("invalid protocol: {}", parts[2])));
    }

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some(pos) = line.find(':') {
            let name = line[..pos].trim().to_string();
            let value = line[pos + 1..].trim().to_string();
            headers.insert(name, value);
        } else {
            return Err(ParseError::InvalidHeader(line.to_string()));
        }
    }

    Ok((method, uri, headers))
}

/// Fluent builder for HAP's small outbound-response vocabulary.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Option<Vec<u8>>,
    content_type: &'static str,
}

impl ResponseBuilder {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
            content_type: "application/hap+json",
        }
    }

    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    #[must_use]
    pub fn error(status: StatusCode) -> Self {
        Self::new(status)
    }

    #[must_use]
    pub fn json_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self.content_type = "application/hap+json";
        self
    }

    #[must_use]
    pub fn tlv_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self.content_type = "application/pairing+tlv8";
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn build(mut self) -> HttpResponse {
        if let Some(ref body) = self.body {
            self.headers.insert("Content-Type".to_string(), self.content_type.to_string());
            self.headers.insert("Content-Length".to_string(), body.len().to_string());
        }
        HttpResponse {
            status: self.status,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        encode_response(&self.build())
    }
}

/// Encode a response to wire bytes (`HTTP/1.1 <code> <reason>\r\n...`).
#[must_use]
pub fn encode_response(response: &HttpResponse) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + response.body.len());
    out.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            response.status.as_u16(),
            status_reason(response.status)
        )
        .as_bytes(),
    );
    for (name, value) in response.headers.iter() {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    if !response.body.is_empty() {
        out.extend_from_slice(&response.body);
    }
    out
}

/// Encode an unsolicited characteristic-change notification (§4.6). Not a
/// reply to any request, but shares the HTTP-shaped framing — sent
/// chunked rather than with a `Content-Length`, since it's pushed outside
/// any request/response exchange.
#[must_use]
pub fn encode_event(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(96 + body.len());
    out.extend_from_slice(b"EVENT/1.0 200 OK\r\n");
    out.extend_from_slice(b"Content-Type: application/hap+json\r\n");
    out.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n0\r\n\r\n");
    out
}

fn status_reason(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200 => "OK",
        204 => "No Content",
        207 => "Multi-Status",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
