//! HTTP protocol version handling and negotiation.
//!
//! The response protocol is the component-wise minimum of the client's and
//! the server's versions. Differing major versions are rejected outright:
//! RFC 9110 says a 505 is the right answer there, never a 400. With equal
//! majors the response may legitimately advertise a higher minor than the
//! client sent (a 1.0 request against a 1.1 server is answered as
//! `HTTP/1.1` with a 1.0 feature set).

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::protocol::ParseError;

/// An HTTP protocol version as a `(major, minor)` pair.
///
/// HTTP/0.9 is not supported; requests that look like 0.9 are almost always
/// malformed 1.0 requests and fail request-line parsing instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HttpVersion {
    major: u8,
    minor: u8,
}

pub const HTTP_10: HttpVersion = HttpVersion { major: 1, minor: 0 };
pub const HTTP_11: HttpVersion = HttpVersion { major: 1, minor: 1 };

impl HttpVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    pub fn is_http11(&self) -> bool {
        *self == HTTP_11
    }
}

impl Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// Parses a request-line protocol token such as `HTTP/1.1`.
impl FromStr for HttpVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("HTTP/").ok_or_else(|| ParseError::invalid_request_line(s))?;
        let (major, minor) = rest.split_once('.').ok_or_else(|| ParseError::invalid_request_line(s))?;
        let major = major.parse::<u8>().map_err(|_| ParseError::invalid_request_line(s))?;
        let minor = minor.parse::<u8>().map_err(|_| ParseError::invalid_request_line(s))?;
        Ok(Self { major, minor })
    }
}

/// The request's major version differs from the server's.
#[derive(Debug, thiserror::Error)]
#[error("http version {requested} not supported (server speaks {supported})")]
pub struct UnsupportedVersion {
    pub requested: HttpVersion,
    pub supported: HttpVersion,
}

/// Computes the response protocol version.
///
/// Fails when the major versions differ; otherwise the negotiated minor is
/// the lesser of the two.
pub fn negotiate(request: HttpVersion, server: HttpVersion) -> Result<HttpVersion, UnsupportedVersion> {
    if request.major != server.major {
        return Err(UnsupportedVersion { requested: request, supported: server });
    }
    Ok(HttpVersion { major: server.major, minor: request.minor.min(server.minor) })
}
