//! Request-line and request-target parsing.
//!
//! The target is separated into its components *before* any percent-escapes
//! are resolved (RFC 3986 §2.4.2: components must be split apart first,
//! otherwise an encoded delimiter becomes indistinguishable from a real
//! one). Path decoding is therefore two-pass: the raw path is split on
//! pre-decoded `%2F` sequences, each piece is decoded independently, and the
//! pieces are rejoined with a literal `%2F` marker. `/a%2Fb/c` and `/a/b/c`
//! stay visibly distinct after decoding.

use http::Method;

use crate::protocol::{HttpVersion, ParseError};

/// The parsed first line of a request.
#[derive(Debug)]
pub struct RequestLine {
    pub method: Method,
    pub target: RequestTarget,
    pub version: HttpVersion,
}

/// A request target split into its RFC 3986 components, still undecoded.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RequestTarget {
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: String,
    pub params: Option<String>,
    pub query: Option<String>,
}

impl RequestTarget {
    /// Path with any params segment reattached (`path;params`), the form the
    /// two-pass decoder operates on.
    pub fn path_with_params(&self) -> String {
        match &self.params {
            Some(params) => format!("{};{}", self.path, params),
            None => self.path.clone(),
        }
    }
}

/// Locates the end of the request line in a raw buffer.
///
/// Returns the line (without its terminator) and the offset of the byte
/// after it. Accepts both CRLF and bare LF, matching what the header
/// tokenizer tolerates.
pub fn split_request_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let lf = buf.iter().position(|b| *b == b'\n')?;
    let line = if lf > 0 && buf[lf - 1] == b'\r' { &buf[..lf - 1] } else { &buf[..lf] };
    Some((line, lf + 1))
}

/// Parses `<method> <target> <protocol>`.
pub fn parse_request_line(line: &[u8]) -> Result<RequestLine, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::invalid_request_line("<non utf-8>"))?;

    let mut parts = line.split_ascii_whitespace();
    let (method, target, protocol) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(protocol), None) => (method, target, protocol),
        _ => return Err(ParseError::invalid_request_line(line)),
    };

    let method = method.parse::<Method>().map_err(|_| ParseError::invalid_request_line(line))?;
    let version = protocol.parse::<HttpVersion>()?;
    let target = parse_target(target)?;

    Ok(RequestLine { method, target, version })
}

/// Splits a request target into scheme, authority, path, params and query.
///
/// A non-empty fragment is a protocol violation: clients must not send one,
/// and a target carrying it fails request assembly with a 400.
pub fn parse_target(target: &str) -> Result<RequestTarget, ParseError> {
    let mut rest = target;

    if let Some((before, fragment)) = rest.split_once('#') {
        if !fragment.is_empty() {
            return Err(ParseError::FragmentInTarget);
        }
        rest = before;
    }

    let scheme = split_scheme(rest).map(|(scheme, after)| {
        rest = after;
        scheme.to_ascii_lowercase()
    });

    let authority = rest.strip_prefix("//").map(|after| {
        let end = after.find(['/', '?']).unwrap_or(after.len());
        let (authority, tail) = after.split_at(end);
        rest = tail;
        authority.to_owned()
    });

    let query = rest.split_once('?').map(|(before, query)| {
        rest = before;
        query.to_owned()
    });

    // Params hang off the last path segment only.
    let last_segment = rest.rfind('/').map_or(0, |i| i + 1);
    let params = rest[last_segment..].find(';').map(|i| {
        let split = last_segment + i;
        let params = rest[split + 1..].to_owned();
        rest = &rest[..split];
        params
    });

    Ok(RequestTarget { scheme, authority, path: rest.to_owned(), params, query })
}

fn split_scheme(target: &str) -> Option<(&str, &str)> {
    let colon = target.find(':')?;
    let candidate = &target[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    // "/a:b" has a colon but no scheme; a scheme is always followed by more
    // target, and never contains a slash before the colon.
    if candidate.contains('/') { None } else { Some((candidate, &target[colon + 1..])) }
}

/// Two-pass path decoding.
///
/// Splits on pre-decoded `%2F` (either case) first, percent-decodes each
/// piece on its own, then rejoins with a literal `%2F`. The rejoined marker
/// is not decoded again, so an encoded slash in the original URI never
/// collapses into a path separator.
pub fn decode_path(path: &str) -> String {
    let mut pieces = Vec::new();
    let bytes = path.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i + 2 < bytes.len() {
        if bytes[i] == b'%' && bytes[i + 1] == b'2' && (bytes[i + 2] == b'F' || bytes[i + 2] == b'f') {
            pieces.push(&path[start..i]);
            start = i + 3;
            i = start;
        } else {
            i += 1;
        }
    }
    pieces.push(&path[start..]);

    pieces.iter().map(|piece| percent_decode(piece)).collect::<Vec<_>>().join("%2F")
}

/// Resolves `%XX` escapes; malformed escapes pass through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::version;

    #[test]
    fn plain_request_line() {
        let (line, rest) = split_request_line(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(line, b"GET /index.html HTTP/1.1");
        assert_eq!(rest, 26);

        let parsed = parse_request_line(line).unwrap();
        assert_eq!(parsed.method, Method::GET);
        assert_eq!(parsed.version, version::HTTP_11);
        assert_eq!(parsed.target.path, "/index.html");
        assert_eq!(parsed.target.query, None);
        assert_eq!(parsed.target.scheme, None);
    }

    #[test]
    fn bare_lf_request_line() {
        let (line, rest) = split_request_line(b"GET / HTTP/1.0\nHost: x\n\n").unwrap();
        assert_eq!(line, b"GET / HTTP/1.0");
        assert_eq!(rest, 15);
    }

    #[test]
    fn absolute_form_target() {
        let target = parse_target("http://example.com/a/b?x=1").unwrap();
        assert_eq!(target.scheme.as_deref(), Some("http"));
        assert_eq!(target.authority.as_deref(), Some("example.com"));
        assert_eq!(target.path, "/a/b");
        assert_eq!(target.query.as_deref(), Some("x=1"));
    }

    #[test]
    fn fragment_is_rejected() {
        assert!(matches!(parse_target("/a/b#frag"), Err(ParseError::FragmentInTarget)));
        // An empty fragment is tolerated, matching urlparse's falsy check.
        assert!(parse_target("/a/b#").is_ok());
    }

    #[test]
    fn params_split_from_last_segment_only() {
        let target = parse_target("/a;v=1/b;u=2?q").unwrap();
        assert_eq!(target.path, "/a;v=1/b");
        assert_eq!(target.params.as_deref(), Some("u=2"));
        assert_eq!(target.query.as_deref(), Some("q"));
        assert_eq!(target.path_with_params(), "/a;v=1/b;u=2");
    }

    #[test]
    fn colon_in_path_is_not_a_scheme() {
        let target = parse_target("/a:b/c").unwrap();
        assert_eq!(target.scheme, None);
        assert_eq!(target.path, "/a:b/c");
    }

    #[test]
    fn decode_resolves_escapes() {
        assert_eq!(decode_path("/this%20path"), "/this path");
        assert_eq!(decode_path("/plain"), "/plain");
    }

    #[test]
    fn encoded_slash_stays_distinct() {
        assert_eq!(decode_path("/a%2Fb/c"), "/a%2Fb/c");
        assert_eq!(decode_path("/a/b/c"), "/a/b/c");
        assert_ne!(decode_path("/a%2Fb/c"), decode_path("/a/b/c"));
        // Lower-case escape is normalized to the canonical marker.
        assert_eq!(decode_path("/a%2fb"), "/a%2Fb");
    }

    #[test]
    fn encoded_slash_adjacent_to_literal_slash() {
        assert_eq!(decode_path("/%2F"), "/%2F");
        assert_eq!(decode_path("//"), "//");
        assert_ne!(decode_path("/%2F"), decode_path("//"));
    }

    #[test]
    fn encoded_slash_adjacent_to_params() {
        // Pinning the two-pass behavior for params mixed with encoded
        // slashes rather than re-deriving intent.
        assert_eq!(decode_path("/a%2Fb;v%20x"), "/a%2Fb;v x");
        assert_eq!(decode_path("/a;%2Fv"), "/a;%2Fv");
    }

    #[test]
    fn malformed_escape_passes_through() {
        assert_eq!(decode_path("/a%zzb"), "/a%zzb");
        assert_eq!(decode_path("/a%2"), "/a%2");
    }
}
