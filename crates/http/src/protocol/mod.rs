//! Core protocol types.
//!
//! - [`Request`] / [`Response`]: the in-flight exchange owned by the
//!   connection table.
//! - [`HttpVersion`] and [`version::negotiate`]: response protocol
//!   negotiation.
//! - [`HttpError`]: the response-bearing error value every failure is
//!   normalized into.
//! - [`ParseError`] / [`SendError`]: internal codec errors.

pub mod version;
pub use version::HttpVersion;

mod request;
pub use request::Request;

mod response;
pub use response::BodyStream;
pub use response::Response;
pub use response::ResponseBody;

mod error;
pub use error::BoxError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
