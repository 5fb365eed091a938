//! Header-block parsing, delegated to `httparse`.
//!
//! The assembler hands over everything after the request line; this module
//! tokenizes the block and returns a typed header map plus the offset of the
//! first body byte in the same buffer. Header names are case-insensitive and
//! repeated names accumulate, both courtesy of [`http::HeaderMap`].
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum size of the header section: 8 KiB

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;

use crate::ensure;
use crate::protocol::ParseError;

/// Maximum number of headers allowed in a request.
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Parses a complete header block.
///
/// # Returns
///
/// - `Ok(Some((headers, body_offset)))` — block parsed; `body_offset` is the
///   index of the first byte after the blank line
/// - `Ok(None)` — the block is not complete yet, more input is needed
/// - `Err(ParseError)` — the block is malformed or exceeds a limit
pub fn decode_header_block(src: &Bytes) -> Result<Option<(HeaderMap, usize)>, ParseError> {
    let mut parsed = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];

    let status = httparse::parse_headers(src, &mut parsed).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    match status {
        Status::Complete((body_offset, parsed)) => {
            ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

            let mut headers = HeaderMap::with_capacity(parsed.len());
            for header in parsed {
                let name = HeaderName::from_bytes(header.name.as_bytes())
                    .map_err(|_| ParseError::invalid_header(header.name))?;
                let value = HeaderValue::from_bytes(header.value)
                    .map_err(|_| ParseError::invalid_header(name.as_str()))?;
                headers.append(name, value);
            }

            Ok(Some((headers, body_offset)))
        }
        Status::Partial => {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            Ok(None)
        }
    }
}

/// Finds the end of the header section (the byte after the blank line).
///
/// Tolerates bare-LF line endings the same way `httparse` does.
pub fn find_block_end(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] != b'\n' {
            i += 1;
            continue;
        }
        match buf.get(i + 1) {
            Some(b'\n') => return Some(i + 2),
            Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some(i + 3),
            _ => i += 1,
        }
    }
    None
}
