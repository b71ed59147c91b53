//! The HTTP/1.1-shaped request/response framing the dispatcher (C8) speaks
//! once a session is `Established` — HAP controllers address it with a
//! restricted vocabulary of methods, paths and status codes (§5).

pub mod server_codec;

#[cfg(test)]
mod tests;

pub use server_codec::{HttpServerCodec, ParseError, ResponseBuilder, encode_response, encode_event};

use std::collections::HashMap;
use std::str::FromStr;

/// HTTP methods HAP controllers use against this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            _ => Err(()),
        }
    }
}

/// Case-sensitive header map, insertion ordered, matching how HAP
/// controllers (and this server) write out a fixed small header set.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// HAP status codes this server ever emits (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const NO_CONTENT: Self = Self(204);
    pub const MULTI_STATUS: Self = Self(207);
    pub const BAD_REQUEST: Self = Self(400);
    pub const NOT_FOUND: Self = Self(404);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// A fully parsed HTTP-shaped request, body already framed by
/// Content-Length.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// An outbound HTTP-shaped response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

pub(crate) fn parse_path_and_query(uri: &str) -> (String, HashMap<String, String>) {
    let Some((path, query_str)) = uri.split_once('?') else {
        return (uri.to_string(), HashMap::new());
    };

    let mut query = HashMap::new();
    for pair in query_str.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            query.insert(k.to_string(), v.to_string());
        } else if !pair.is_empty() {
            query.insert(pair.to_string(), String::new());
        }
    }
    (path.to_string(), query)
}
