use http::StatusCode;
use thiserror::Error;

use crate::bus::ConnId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A protocol or application failure expressed as a response-to-be.
///
/// Every error path in the engine is normalized into one of these as early
/// as possible and funneled through the error adapter
/// ([`HttpEngine::handle_error`](crate::engine::HttpEngine::handle_error)),
/// so the client always receives a complete response. Applications construct
/// them too, to short-circuit a request with an arbitrary status.
#[derive(Debug, Error)]
#[error("{status} {}", .message.as_deref().unwrap_or_default())]
pub struct HttpError {
    conn: ConnId,
    status: StatusCode,
    message: Option<String>,
    #[source]
    cause: Option<BoxError>,
}

impl HttpError {
    pub fn new(conn: ConnId, status: StatusCode) -> Self {
        Self { conn, status, message: None, cause: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_cause(mut self, cause: BoxError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn bad_request(conn: ConnId) -> Self {
        Self::new(conn, StatusCode::BAD_REQUEST)
    }

    pub fn not_found(conn: ConnId) -> Self {
        Self::new(conn, StatusCode::NOT_FOUND)
    }

    pub fn version_not_supported(conn: ConnId) -> Self {
        Self::new(conn, StatusCode::HTTP_VERSION_NOT_SUPPORTED)
    }

    pub fn request_failed(conn: ConnId, cause: BoxError) -> Self {
        Self::new(conn, StatusCode::INTERNAL_SERVER_ERROR).with_message("Request Failed").with_cause(cause)
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cause(&self) -> Option<&BoxError> {
        self.cause.as_ref()
    }
}

/// Request assembly errors.
///
/// These never escape the engine: the assembler maps each of them onto an
/// [`HttpError`] with status 400 and aborts assembly for the connection.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid request line: {line}")]
    InvalidRequestLine { line: String },

    #[error("request target carries a fragment")]
    FragmentInTarget,

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },
}

impl ParseError {
    pub fn invalid_request_line<S: ToString>(line: S) -> Self {
        Self::InvalidRequestLine { line: line.to_string() }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }
}

/// Response serialization errors.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }
}
