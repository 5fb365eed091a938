//! An event-driven HTTP/1.x protocol engine
//!
//! This crate implements the server side of HTTP/1.0 and HTTP/1.1 as a
//! sans-IO state machine: bytes go in through [`engine::HttpEngine::on_read`],
//! typed events come out of an internal queue, and a small driver loop maps
//! those events onto a [`transport::Transport`]. A tokio front end
//! ([`server::serve`]) is provided, but the engine itself never touches a
//! socket, which keeps the whole protocol surface testable without I/O.
//!
//! # Features
//!
//! - Request assembly from arbitrary byte fragments (split request lines,
//!   split header blocks, bodies arriving over many reads)
//! - Protocol version negotiation, including 505 rejection of unsupported
//!   major versions
//! - Percent-decoding of request paths that keeps `%2F` distinct from `/`
//! - Keep-alive and `Connection` header persistence rules for 1.0 and 1.1
//! - Fixed, chunked and streamed response bodies with cooperative pumping
//! - Expect/100-continue handling
//! - Entity size limits answered with 413
//! - An overridable error adapter rendering HTML error pages
//!
//! # Example
//!
//! ```no_run
//! use pulse_http::engine::{HttpEngine, ReturnValue};
//! use pulse_http::handler::make_handler;
//! use tokio::net::TcpListener;
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = make_handler(|request, _response| {
//!         Ok(ReturnValue::Text(format!("Hello from {}!\r\n", request.path())))
//!     });
//!     pulse_http::server::serve(listener, HttpEngine::new(), handler).await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`bus`]: connection identifiers and the typed event queue
//! - [`protocol`]: request, response, version and error types
//! - [`codec`]: wire-level parsing and serialization
//! - [`engine`]: the state machine (assembly, emission, dispatch policy)
//! - [`handler`]: the application-side request handler trait
//! - [`server`]: the driver loop and the tokio front end
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No TLS support (use a reverse proxy for HTTPS)
//! - No inbound chunked request bodies; requests are length-delimited
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod bus;
pub mod codec;
pub mod engine;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
