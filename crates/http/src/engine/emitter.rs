//! Response emission.
//!
//! Serializes a [`Response`] head plus body into `Write` events on the bus.
//! Fixed bodies go out in one step; streamed bodies are pumped one chunk per
//! [`HttpEngine::pump`] call, each step scheduling the next with a `Stream`
//! event, so a long body never blocks other connections.

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use http::header::{self, HeaderValue};
use tokio_util::codec::Encoder;
use tracing::{error, trace};

use super::HttpEngine;
use crate::bus::{ConnId, Event, EventBus};
use crate::codec;
use crate::codec::body::{ChunkedEncoder, PayloadItem};
use crate::protocol::{Response, ResponseBody};

impl HttpEngine {
    /// Serializes and emits a response onto the bus.
    ///
    /// For fixed bodies this is terminal: the response is marked done and,
    /// if required, a `Close` follows the payload. For streamed bodies only
    /// the head and the first pump step are scheduled here; the response
    /// stays live until the stream is exhausted.
    pub(crate) fn emit(bus: &mut EventBus, response: &mut Response) {
        if response.done() {
            return;
        }
        let conn = response.conn();

        let mut head = BytesMut::new();
        if let Err(e) = codec::encode_head(response, &mut head) {
            error!(%conn, error = %e, "failed to serialize response head");
            bus.push(Event::Close { conn });
            response.finish();
            return;
        }
        bus.push(Event::Write { conn, data: head.freeze() });

        if response.is_stream() {
            let chunk = Self::pull(response);
            bus.push(Event::Stream { conn, chunk });
            return;
        }

        match response.take_body() {
            ResponseBody::Full(bytes) if response.chunked() => {
                let mut framed = BytesMut::new();
                let mut encoder = ChunkedEncoder::new();
                // Framing a fixed buffer is infallible.
                let _ = encoder.encode(PayloadItem::Chunk(bytes), &mut framed);
                let _ = encoder.encode(PayloadItem::Eof, &mut framed);
                bus.push(Event::Write { conn, data: framed.freeze() });
            }
            ResponseBody::Full(bytes) => {
                bus.push(Event::Write { conn, data: bytes });
            }
            ResponseBody::Empty if response.chunked() => {
                bus.push(Event::Write { conn, data: Bytes::from_static(b"0\r\n\r\n") });
            }
            ResponseBody::Empty => {}
            // Unreachable, is_stream() was checked above.
            ResponseBody::Streaming(_) => {}
        }

        if response.close() {
            bus.push(Event::Close { conn });
        }
        response.finish();
        trace!(%conn, "response emitted");
    }

    fn pull(response: &mut Response) -> Option<Bytes> {
        match response.body_mut() {
            ResponseBody::Streaming(stream) => stream.next_chunk(),
            _ => None,
        }
    }

    pub(crate) fn release_stream(response: &mut Response) {
        if let ResponseBody::Streaming(mut stream) = response.take_body() {
            stream.release();
        }
    }

    /// One step of a streamed body: writes the given chunk and schedules the
    /// next pull, or terminates the stream on end of input.
    ///
    /// A step for a connection whose exchange is gone or already done is a
    /// stale leftover from a disconnect and is dropped silently.
    pub fn pump(&mut self, conn: ConnId, chunk: Option<Bytes>) {
        let Some(exchange) = self.table.get_mut(conn) else {
            trace!(%conn, "stale pump step dropped");
            return;
        };
        let response = &mut exchange.response;
        if response.done() {
            trace!(%conn, "stale pump step dropped");
            return;
        }

        match chunk {
            Some(data) if !data.is_empty() => {
                let data = if response.chunked() {
                    let mut framed = BytesMut::new();
                    let _ = ChunkedEncoder::new().encode(PayloadItem::Chunk(data), &mut framed);
                    framed.freeze()
                } else {
                    data
                };
                self.bus.push(Event::Write { conn, data });
                let next = Self::pull(response);
                self.bus.push(Event::Stream { conn, chunk: next });
            }
            // An empty chunk and an exhausted stream both mean end of body.
            _ => {
                Self::release_stream(response);
                if response.chunked() {
                    self.bus.push(Event::Write { conn, data: Bytes::from_static(b"0\r\n\r\n") });
                }
                if response.close() {
                    self.bus.push(Event::Close { conn });
                }
                response.finish();
                trace!(%conn, "stream complete");
            }
        }
    }

    /// Emits a minimal standalone response outside any exchange: interim
    /// `100 Continue`, or a terminal rejection such as `413`.
    ///
    /// A 413 under HTTP/1.1 always closes the connection and says so, since
    /// the client may still be mid-upload.
    pub fn simple(&mut self, conn: ConnId, status: StatusCode, message: Option<&str>) {
        let mut response = Response::new(conn);
        response.set_status(status);
        response.set_version(self.server_version);

        if !status.is_informational() {
            let body = message.map(str::to_owned).or_else(|| status.canonical_reason().map(str::to_owned));
            if let Some(body) = body {
                response.set_body(body);
            }
        }

        if status == StatusCode::PAYLOAD_TOO_LARGE && response.version().is_http11() {
            response.set_close(true);
            response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        Self::emit(&mut self.bus, &mut response);
    }
}
