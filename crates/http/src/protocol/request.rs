//! Inbound request representation.
//!
//! A [`Request`] is built incrementally by the assembler: the request line
//! and headers first, then body bytes appended across however many reads the
//! transport delivers. It is owned by the connection table entry until its
//! response has been emitted.

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method};

use crate::bus::ConnId;
use crate::protocol::version::HttpVersion;

/// A fully parsed (and possibly still body-collecting) HTTP request.
#[derive(Debug)]
pub struct Request {
    conn: ConnId,
    method: Method,
    scheme: Option<String>,
    path: String,
    query: Option<String>,
    version: HttpVersion,
    server_version: HttpVersion,
    headers: HeaderMap,
    body: BytesMut,
    handled: bool,
}

impl Request {
    pub(crate) fn new(
        conn: ConnId,
        method: Method,
        scheme: Option<String>,
        path: String,
        query: Option<String>,
        version: HttpVersion,
        server_version: HttpVersion,
    ) -> Self {
        Self {
            conn,
            method,
            scheme,
            path,
            query,
            version,
            server_version,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            handled: false,
        }
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Decoded request path. Percent-escapes are resolved except for encoded
    /// slashes, which stay as literal `%2F` so they remain distinguishable
    /// from path separators.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw (undecoded) query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Protocol version as sent by the client.
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// Protocol version this server speaks.
    pub fn server_version(&self) -> HttpVersion {
        self.server_version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    /// Declared `Content-Length`. Absent counts as zero; a malformed value
    /// also counts as zero rather than stalling assembly forever.
    pub fn content_length(&self) -> u64 {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    pub(crate) fn append_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    pub(crate) fn body_len(&self) -> u64 {
        self.body.len() as u64
    }

    /// Body bytes, readable from offset 0. Complete (length equal to the
    /// declared `Content-Length`) by the time the request is dispatched.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Copies the body out as a cheap shared handle.
    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }

    /// True once any application handler has claimed this request.
    pub fn handled(&self) -> bool {
        self.handled
    }

    /// Monotonic: there is no way to un-claim a request.
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }
}
