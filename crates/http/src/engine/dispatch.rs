//! Dispatch-outcome policy and the error adapter.
//!
//! The application layer reports how a request was handled through
//! [`Outcome`]; the engine maps that report onto wire effects here. Every
//! error path ends in [`HttpEngine::handle_error`], which consults the
//! optional [`ErrorHook`] and otherwise renders a default HTML error page,
//! so a client never waits on a request that died inside the server.

use bytes::Bytes;
use http::StatusCode;
use http::header::{self, HeaderValue};
use tracing::{error, warn};

use super::HttpEngine;
use crate::bus::ConnId;
use crate::protocol::{BoxError, HttpError, Response};

/// Value produced by a request handler.
#[derive(Debug)]
pub enum ReturnValue {
    /// The handler did not claim the request; dispatch falls through to 404.
    None,
    /// The handler prepared the response in place; emit it as-is.
    Handled,
    /// A text body for the prepared response.
    Text(String),
    /// A raw body for the prepared response.
    Bytes(Bytes),
    /// A full replacement response superseding the prepared one.
    Response(Response),
    /// The handler failed with an HTTP-shaped error.
    Error(HttpError),
}

/// A dispatch report from the application layer.
#[derive(Debug)]
pub enum Outcome {
    /// Dispatch ran to completion with a value.
    Success(ReturnValue),
    /// A filter intercepted the request; its value is authoritative.
    Filtered(ReturnValue),
    /// Dispatch raised an error.
    Failed(BoxError),
    /// Dispatch is over; `matched` says whether any route claimed the
    /// request.
    Completed { matched: bool },
}

/// Override produced by an [`ErrorHook`] in place of the default error page.
#[derive(Debug)]
pub enum ErrorOverride {
    /// Custom body for the error response; status and headers stay.
    Text(String),
    /// A full replacement response.
    Response(Response),
}

/// Application hook consulted before an error response is rendered.
///
/// Returning `None` falls through to the default HTML error page.
pub trait ErrorHook {
    fn on_error(&mut self, error: &HttpError) -> Option<ErrorOverride>;
}

impl HttpEngine {
    /// Applies a dispatch report to the connection's exchange.
    pub fn on_outcome(&mut self, conn: ConnId, outcome: Outcome) {
        match outcome {
            Outcome::Success(value) | Outcome::Filtered(value) => self.apply_return(conn, value),
            Outcome::Failed(cause) => self.handle_error(HttpError::request_failed(conn, cause)),
            Outcome::Completed { matched } => {
                // An unclaimed request falls through to 404. An already-done
                // response (error emitted mid-dispatch) is left alone.
                let needs_not_found = self.table.get(conn).is_some_and(|exchange| {
                    !exchange.response.done() && (!exchange.request.handled() || !matched)
                });
                if needs_not_found {
                    let path = self.table.get(conn).map(|e| e.request.path().to_owned()).unwrap_or_default();
                    self.handle_error(HttpError::not_found(conn).with_message(path));
                }
            }
        }
    }

    fn apply_return(&mut self, conn: ConnId, value: ReturnValue) {
        match value {
            ReturnValue::None => {}
            ReturnValue::Handled => {
                if let Some(exchange) = self.table.get_mut(conn) {
                    exchange.request.mark_handled();
                    Self::emit(&mut self.bus, &mut exchange.response);
                }
            }
            ReturnValue::Text(text) => self.body_and_emit(conn, Bytes::from(text)),
            ReturnValue::Bytes(bytes) => self.body_and_emit(conn, bytes),
            ReturnValue::Response(mut replacement) => {
                if let Some(exchange) = self.table.get_mut(conn) {
                    exchange.request.mark_handled();
                    // Keep the negotiated version and persistence decision.
                    replacement.set_version(exchange.response.version());
                    if exchange.response.close() {
                        replacement.set_close(true);
                    }
                    exchange.response = replacement;
                    Self::emit(&mut self.bus, &mut exchange.response);
                } else {
                    Self::emit(&mut self.bus, &mut replacement);
                }
            }
            ReturnValue::Error(e) => {
                if let Some(exchange) = self.table.get_mut(conn) {
                    exchange.request.mark_handled();
                }
                self.handle_error(e);
            }
        }
    }

    fn body_and_emit(&mut self, conn: ConnId, body: Bytes) {
        let Some(exchange) = self.table.get_mut(conn) else { return };
        exchange.request.mark_handled();
        exchange.response.set_body(body);
        Self::emit(&mut self.bus, &mut exchange.response);
    }

    /// The error adapter: logs, consults the hook, renders a response.
    pub fn handle_error(&mut self, err: HttpError) {
        let conn = err.conn();
        match err.cause() {
            Some(cause) => error!(%conn, status = %err.status(), %cause, "request failed"),
            None => warn!(%conn, status = %err.status(), message = err.message().unwrap_or_default(), "http error"),
        }

        match self.error_hook.as_mut().and_then(|hook| hook.on_error(&err)) {
            Some(ErrorOverride::Response(replacement)) => {
                self.apply_return(conn, ReturnValue::Response(replacement));
            }
            Some(ErrorOverride::Text(body)) => self.emit_error(&err, body),
            None => {
                let body = default_error_page(err.status(), err.message());
                self.emit_error(&err, body);
            }
        }
    }

    fn emit_error(&mut self, err: &HttpError, body: String) {
        let conn = err.conn();
        if let Some(exchange) = self.table.get_mut(conn) {
            let response = &mut exchange.response;
            response.set_status(err.status());
            response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
            response.set_body(body);
            Self::emit(&mut self.bus, response);
        } else {
            let mut response = Response::new(conn);
            response.set_version(self.server_version);
            response.set_status(err.status());
            response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
            response.set_body(body);
            Self::emit(&mut self.bus, &mut response);
        }
    }
}

/// The default HTML error page.
pub fn default_error_page(status: StatusCode, message: Option<&str>) -> String {
    let code = status.as_str();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let mut page = format!(
        "<html><head><title>{code} {reason}</title></head><body><h1>{code} {reason}</h1>"
    );
    if let Some(message) = message.filter(|m| !m.is_empty()) {
        page.push_str(&format!("<p>{message}</p>"));
    }
    page.push_str("</body></html>");
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_with_message() {
        let page = default_error_page(StatusCode::NOT_FOUND, Some("/missing"));
        assert!(page.contains("<title>404 Not Found</title>"), "{page}");
        assert!(page.contains("<h1>404 Not Found</h1>"), "{page}");
        assert!(page.contains("<p>/missing</p>"), "{page}");
    }

    #[test]
    fn error_page_without_message() {
        let page = default_error_page(StatusCode::INTERNAL_SERVER_ERROR, None);
        assert!(!page.contains("<p>"), "{page}");
    }
}
