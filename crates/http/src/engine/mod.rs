//! The HTTP/1.x protocol engine.
//!
//! [`HttpEngine`] is the event-driven core of the server: it assembles
//! requests out of raw byte chunks ([`HttpEngine::on_read`]), negotiates the
//! response protocol version, emits responses ([`emitter`]) and reconciles
//! application dispatch outcomes ([`dispatch`]). It performs no I/O itself;
//! every externally visible effect is an [`Event`] on the internal bus,
//! drained by a driver loop (see [`crate::server`]).
//!
//! One call never does unbounded work: collecting a body across reads,
//! waiting for a header block to complete, or pumping a streamed response
//! are all expressed as re-entrant scheduling, so a single connection cannot
//! monopolize the loop.

mod table;
pub use table::ConnectionTable;
pub use table::Exchange;

mod emitter;

mod dispatch;
pub use dispatch::ErrorHook;
pub use dispatch::ErrorOverride;
pub use dispatch::Outcome;
pub use dispatch::ReturnValue;

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use http::header::{CONNECTION, EXPECT};
use tracing::{debug, trace};

use crate::bus::{ConnId, Event, EventBus};
use crate::codec::header::{self, MAX_HEADER_BYTES};
use crate::codec::uri::{self, RequestLine};
use crate::protocol::version::{self, HttpVersion};
use crate::protocol::{HttpError, Request, Response};

/// Outcome of processing the opening bytes of a request.
enum Begin {
    /// Headers parsed, body incomplete: await more input.
    AwaitBody,
    /// The request is fully buffered.
    Complete,
    /// A reply (interim or error) was already emitted; nothing to dispatch.
    Settled,
}

/// The protocol state machine for all connections of one server.
#[derive(Debug)]
pub struct HttpEngine {
    server_version: HttpVersion,
    max_entity: Option<u64>,
    table: ConnectionTable,
    /// Header fragments of connections whose request line has not fully
    /// arrived yet.
    partial: HashMap<ConnId, BytesMut>,
    bus: EventBus,
    error_hook: Option<Box<dyn ErrorHook + Send>>,
}

impl std::fmt::Debug for dyn ErrorHook + Send {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ErrorHook")
    }
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpEngine {
    pub fn new() -> Self {
        Self {
            server_version: version::HTTP_11,
            max_entity: None,
            table: ConnectionTable::new(),
            partial: HashMap::new(),
            bus: EventBus::new(),
            error_hook: None,
        }
    }

    /// Protocol version this server speaks (default HTTP/1.1).
    pub fn with_server_version(mut self, version: HttpVersion) -> Self {
        self.server_version = version;
        self
    }

    /// Upper bound on a request entity; larger requests are answered 413.
    pub fn with_max_entity(mut self, limit: u64) -> Self {
        self.max_entity = Some(limit);
        self
    }

    /// Installs the overridable error-handling hook consulted before an
    /// error response is emitted.
    pub fn with_error_hook(mut self, hook: Box<dyn ErrorHook + Send>) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Pops the next pending event, FIFO.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.bus.pop()
    }

    /// The in-flight exchange for a connection, if any.
    pub fn entry_mut(&mut self, conn: ConnId) -> Option<(&mut Request, &mut Response)> {
        self.table.get_mut(conn).map(|exchange| (&mut exchange.request, &mut exchange.response))
    }

    /// Inbound byte-chunk delivery: the single entry point of the request
    /// assembler.
    pub fn on_read(&mut self, conn: ConnId, data: Bytes) {
        trace!(%conn, len = data.len(), "inbound bytes");

        // A finished exchange makes room: these bytes start a new request.
        self.table.evict_done(conn);

        let mut over_limit = false;
        let mut complete = false;
        if let Some(exchange) = self.table.get_mut(conn) {
            // Body still being collected. Bytes beyond the declared length
            // are not part of this request and are discarded.
            let declared = exchange.request.content_length();
            let remaining = declared.saturating_sub(exchange.request.body_len());
            let take = (data.len() as u64).min(remaining) as usize;
            exchange.request.append_body(&data[..take]);
            over_limit = self.max_entity.is_some_and(|max| declared > max);
            complete = exchange.request.body_len() == declared;
        } else {
            self.begin(conn, &data);
            return;
        }

        if over_limit {
            self.reject_too_large(conn);
        } else if complete {
            self.finish(conn);
        }
        // Otherwise: await more input, no externally visible effect.
    }

    /// Disconnect notification: evicts all per-connection state and releases
    /// an abandoned streaming body.
    pub fn on_disconnect(&mut self, conn: ConnId) {
        self.partial.remove(&conn);
        if let Some(mut exchange) = self.table.remove(conn) {
            debug!(%conn, done = exchange.response.done(), "disconnect evicted in-flight exchange");
            if !exchange.response.done() {
                Self::release_stream(&mut exchange.response);
            }
        }
    }

    /// Entity-too-large signal from the transport.
    pub fn on_too_large(&mut self, conn: ConnId) {
        self.reject_too_large(conn);
    }

    fn reject_too_large(&mut self, conn: ConnId) {
        debug!(%conn, "request entity too large");
        // The client may still be sending data we have abandoned; the 413
        // reply never keeps the connection alive.
        self.partial.remove(&conn);
        if let Some(mut exchange) = self.table.remove(conn) {
            if !exchange.response.done() {
                Self::release_stream(&mut exchange.response);
            }
        }
        self.simple(conn, http::StatusCode::PAYLOAD_TOO_LARGE, None);
    }

    /// Starts (or continues starting) a new request from raw bytes.
    fn begin(&mut self, conn: ConnId, data: &[u8]) {
        let mut buf = self.partial.remove(&conn).unwrap_or_default();
        buf.extend_from_slice(data);

        if header::find_block_end(&buf).is_none() {
            if buf.len() > MAX_HEADER_BYTES {
                self.handle_error(HttpError::bad_request(conn).with_message("header section too large"));
                return;
            }
            // Header block incomplete: keep the fragment for the next read.
            self.partial.insert(conn, buf);
            return;
        }

        match self.parse_request(conn, buf.freeze()) {
            Ok(Begin::AwaitBody) | Ok(Begin::Settled) => {}
            Ok(Begin::Complete) => self.finish(conn),
            Err(error) => {
                // No entry persists for a malformed request, so subsequent
                // bytes are not misread as a continuation of it.
                self.table.remove(conn);
                self.handle_error(error);
            }
        }
    }

    fn parse_request(&mut self, conn: ConnId, buf: Bytes) -> Result<Begin, HttpError> {
        let Some((line, header_start)) = uri::split_request_line(&buf) else {
            return Err(HttpError::bad_request(conn));
        };

        let RequestLine { method, target, version: requested } =
            uri::parse_request_line(line).map_err(|e| HttpError::bad_request(conn).with_message(e.to_string()))?;

        let path = uri::decode_path(&target.path_with_params());
        debug!(%conn, %method, path, "request line parsed");

        let request = Request::new(conn, method, target.scheme, path, target.query, requested, self.server_version);
        let response = Response::new(conn);
        self.table.insert(conn, request, response);

        // RFC 9110: only a differing *major* version warrants a 505. With
        // equal majors the response is framed with the lesser minor.
        let negotiated = match version::negotiate(requested, self.server_version) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                self.handle_error(HttpError::version_not_supported(conn).with_message(e.to_string()));
                return Ok(Begin::Settled);
            }
        };
        if let Some(exchange) = self.table.get_mut(conn) {
            exchange.response.set_version(negotiated);
        }

        let block = buf.slice(header_start..);
        let (headers, body_offset) = match header::decode_header_block(&block) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                self.table.remove(conn);
                self.handle_error(HttpError::bad_request(conn).with_message("truncated header block"));
                return Ok(Begin::Settled);
            }
            Err(e) => {
                self.table.remove(conn);
                self.handle_error(HttpError::bad_request(conn).with_message(e.to_string()));
                return Ok(Begin::Settled);
            }
        };

        // The wire token is case-sensitive.
        let expect_continue = headers.get(EXPECT).is_some_and(|value| value.as_bytes() == b"100-continue");

        let (declared, buffered) = {
            let Some(exchange) = self.table.get_mut(conn) else { return Ok(Begin::Settled) };
            exchange.request.set_headers(headers);
            let declared = exchange.request.content_length();
            // The header-adjacent remainder is clamped the same way later
            // reads are: the body never grows past the declared length.
            let remainder = &block[body_offset..];
            let take = (remainder.len() as u64).min(declared) as usize;
            exchange.request.append_body(&remainder[..take]);
            (declared, exchange.request.body_len())
        };

        if expect_continue {
            // Tell the client to go ahead; the body follows in later reads
            // and completion is re-checked there.
            self.simple(conn, http::StatusCode::CONTINUE, None);
            return Ok(Begin::Settled);
        }

        if self.max_entity.is_some_and(|max| declared > max || buffered > max) {
            self.reject_too_large(conn);
            return Ok(Begin::Settled);
        }

        if buffered == declared { Ok(Begin::Complete) } else { Ok(Begin::AwaitBody) }
    }

    /// Completion: the body matches the declared length. Decides persistence
    /// and hands the exchange to the application layer.
    fn finish(&mut self, conn: ConnId) {
        let Some(exchange) = self.table.get_mut(conn) else { return };

        let negotiated = exchange.response.version();
        let connection = exchange
            .request
            .headers()
            .get(CONNECTION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase());

        // HTTP/1.1 stays open unless told to close; anything involving 1.0
        // closes unless explicitly kept alive.
        let close = if negotiated.is_http11() {
            connection.as_deref() == Some("close")
        } else {
            connection.as_deref() != Some("keep-alive")
        };
        if close {
            exchange.response.set_close(true);
        }

        debug!(%conn, %negotiated, close, body = exchange.request.body_len(), "request complete");
        self.bus.push(Event::Ready { conn });
    }
}

#[cfg(test)]
mod tests;
