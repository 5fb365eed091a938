//! Outbound response representation.
//!
//! A [`Response`] is created alongside its request during assembly and
//! mutated by the application before the emitter serializes it. Standalone
//! responses (no originating request) exist for protocol-level replies such
//! as `100 Continue`.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::bus::ConnId;
use crate::protocol::version::{self, HttpVersion};

/// Pull-based source for a streamed response body.
///
/// Implementations are finite and externally driven: the emitter pulls one
/// chunk per pump step and never iterates eagerly. An empty chunk (or `None`)
/// marks end of stream, after which [`release`](BodyStream::release) is
/// called exactly once to free any underlying resource (a file handle, a
/// scoped buffer). Abandoned streams — connection dropped mid-body — are
/// released through the same call when the table entry is evicted.
pub trait BodyStream {
    fn next_chunk(&mut self) -> Option<Bytes>;

    fn release(&mut self) {}
}

/// The three body shapes a response can carry.
pub enum ResponseBody {
    /// No body at all.
    Empty,
    /// A fixed payload written atomically after the header block.
    Full(Bytes),
    /// A lazy sequence of chunks pumped cooperatively.
    Streaming(Box<dyn BodyStream + Send>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Full(bytes)
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Full(Bytes::from(text))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(text: &'static str) -> Self {
        ResponseBody::Full(Bytes::from_static(text.as_bytes()))
    }
}

/// An HTTP response under construction or emission.
#[derive(Debug)]
pub struct Response {
    conn: ConnId,
    status: StatusCode,
    version: HttpVersion,
    headers: HeaderMap,
    body: ResponseBody,
    chunked: bool,
    close: bool,
    done: bool,
}

impl Response {
    /// Creates a response for `conn` with the server's default protocol
    /// version. The assembler overwrites the version with the negotiated one.
    pub fn new(conn: ConnId) -> Self {
        Self {
            conn,
            status: StatusCode::OK,
            version: version::HTTP_11,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            chunked: false,
            close: false,
            done: false,
        }
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Negotiated protocol version the status line is written with.
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn set_version(&mut self, version: HttpVersion) {
        self.version = version;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<ResponseBody>) {
        self.body = body.into();
    }

    /// Attaches a streamed body. Under HTTP/1.1 the total length is unknown
    /// upfront, so the body is framed with chunked transfer-coding; under
    /// HTTP/1.0 the bytes are written raw and the connection delimits them.
    pub fn set_stream(&mut self, stream: Box<dyn BodyStream + Send>) {
        self.chunked = self.version.is_http11();
        self.body = ResponseBody::Streaming(stream);
    }

    pub(crate) fn take_body(&mut self) -> ResponseBody {
        std::mem::replace(&mut self.body, ResponseBody::Empty)
    }

    pub(crate) fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    /// Whether the body is framed with chunked transfer-coding.
    pub fn chunked(&self) -> bool {
        self.chunked
    }

    pub fn set_chunked(&mut self, chunked: bool) {
        self.chunked = chunked;
    }

    /// Whether the body is a lazy sequence pumped incrementally.
    pub fn is_stream(&self) -> bool {
        matches!(self.body, ResponseBody::Streaming(_))
    }

    /// Whether the connection must close after this response.
    pub fn close(&self) -> bool {
        self.close
    }

    pub fn set_close(&mut self, close: bool) {
        self.close = close;
    }

    /// True once the response has been fully emitted.
    pub fn done(&self) -> bool {
        self.done
    }

    /// Monotonic: `done` never transitions back to false.
    pub(crate) fn finish(&mut self) {
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoChunks(usize);

    impl BodyStream for TwoChunks {
        fn next_chunk(&mut self) -> Option<Bytes> {
            self.0 += 1;
            match self.0 {
                1 => Some(Bytes::from_static(b"a")),
                2 => Some(Bytes::from_static(b"b")),
                _ => None,
            }
        }
    }

    #[test]
    fn stream_body_is_chunked_under_http11() {
        let mut response = Response::new(ConnId::new(1));
        response.set_stream(Box::new(TwoChunks(0)));
        assert!(response.chunked());
        assert!(response.is_stream());
    }

    #[test]
    fn stream_body_is_raw_under_http10() {
        let mut response = Response::new(ConnId::new(1));
        response.set_version(version::HTTP_10);
        response.set_stream(Box::new(TwoChunks(0)));
        assert!(!response.chunked());
        assert!(response.is_stream());
    }

    #[test]
    fn fixed_bodies() {
        let mut response = Response::new(ConnId::new(1));
        assert!(matches!(response.body(), ResponseBody::Empty));
        response.set_body("hello");
        assert!(matches!(response.body(), ResponseBody::Full(_)));
        assert!(!response.is_stream());
    }
}
