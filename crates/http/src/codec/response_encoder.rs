//! Response head serialization.
//!
//! Writes the status line and header block of a [`Response`] into an output
//! buffer. Framing headers (`Content-Length`, `Transfer-Encoding`) are
//! derived from the body shape rather than trusted from the header map, so a
//! response can never advertise one framing and use another. Interim (1xx)
//! responses carry neither a body nor framing headers.

use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::header;

use crate::protocol::{Response, ResponseBody, SendError};

/// Initial buffer size reserved for head serialization.
const INIT_HEAD_SIZE: usize = 1024;

/// Serializes the status line and headers of a response.
///
/// The status line is written with the response's negotiated protocol
/// version: `HTTP/<major>.<minor> <code> <reason>`.
pub fn encode_head(response: &Response, dst: &mut BytesMut) -> Result<(), SendError> {
    dst.reserve(INIT_HEAD_SIZE);

    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    write!(FastWrite(dst), "{} {} {}\r\n", response.version(), status.as_str(), reason)?;

    for (name, value) in response.headers() {
        // Framing headers are recomputed below.
        if *name == header::CONTENT_LENGTH || *name == header::TRANSFER_ENCODING {
            continue;
        }
        dst.put_slice(name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(value.as_ref());
        dst.put_slice(b"\r\n");
    }

    if !status.is_informational() {
        if response.chunked() {
            dst.put_slice(b"transfer-encoding: chunked\r\n");
        } else {
            match response.body() {
                ResponseBody::Full(bytes) => {
                    write!(FastWrite(dst), "content-length: {}\r\n", bytes.len())?;
                }
                ResponseBody::Empty => {
                    dst.put_slice(b"content-length: 0\r\n");
                }
                // Raw (non-chunked) stream: the close delimits the body.
                ResponseBody::Streaming(_) => {}
            }
        }
    }

    dst.put_slice(b"\r\n");
    Ok(())
}

/// Writes into a `BytesMut` without going through an io sink.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
