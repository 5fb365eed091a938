//! Response payload framing.
//!
//! Fixed payloads are written raw after the header block and delimited by
//! `Content-Length`; streamed payloads under HTTP/1.1 are framed by the
//! [`ChunkedEncoder`]. Chunked *request* bodies are not decoded here, the
//! engine does not accept them.

mod chunked_encoder;
pub use chunked_encoder::ChunkedEncoder;

use bytes::Bytes;

/// One element of a payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A chunk of payload data.
    Chunk(Bytes),
    /// Marks the end of the payload stream.
    Eof,
}

impl PayloadItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }
}
