//! Wire-level parsing and serialization.
//!
//! - [`uri`]: request-line and request-target parsing, including the
//!   two-pass path decode that keeps encoded slashes distinct.
//! - [`header`]: header-block tokenizing, delegated to `httparse`.
//! - [`encode_head`]: status line and header serialization.
//! - [`body`]: chunked transfer-coding for streamed response payloads.

pub mod body;
pub mod header;
pub mod uri;

mod response_encoder;
pub use response_encoder::encode_head;
