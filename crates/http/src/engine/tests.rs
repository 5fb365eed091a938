use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use indoc::indoc;

use super::*;
use crate::handler::{make_handler, Handler};
use crate::protocol::{BodyStream, Response};
use crate::server::drive;
use crate::transport::Transport;

const CONN: ConnId = ConnId::new(1);

#[derive(Debug, Default)]
struct TestTransport {
    written: Vec<(ConnId, Bytes)>,
    closed: Vec<ConnId>,
}

impl Transport for TestTransport {
    fn write(&mut self, conn: ConnId, data: Bytes) {
        self.written.push((conn, data));
    }

    fn close(&mut self, conn: ConnId) {
        self.closed.push(conn);
    }
}

impl TestTransport {
    fn output(&self, conn: ConnId) -> String {
        let bytes: Vec<u8> = self
            .written
            .iter()
            .filter(|(c, _)| *c == conn)
            .flat_map(|(_, data)| data.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn is_closed(&self, conn: ConnId) -> bool {
        self.closed.contains(&conn)
    }
}

/// Splits raw output into (head, payload) at the first blank line.
fn split_head(output: &str) -> (&str, &str) {
    output.split_once("\r\n\r\n").expect("no blank line in output")
}

fn echo_path_handler() -> impl Handler {
    make_handler(|request, _response| Ok(ReturnValue::Text(format!("path={}", request.path()))))
}

fn echo_body_handler() -> impl Handler {
    make_handler(|request, _response| Ok(ReturnValue::Text(String::from_utf8_lossy(request.body()).into_owned())))
}

fn run(engine: &mut HttpEngine, handler: &mut impl Handler, transport: &mut TestTransport, wire: &[u8]) {
    engine.on_read(CONN, Bytes::copy_from_slice(wire));
    drive(engine, handler, transport);
}

#[test]
fn get_round_trip() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 200 OK\r\n"), "{output:?}");
    assert!(output.contains("content-length: 11\r\n"), "{output:?}");
    assert!(output.ends_with("path=/hello"), "{output:?}");
    assert!(!transport.is_closed(CONN));
}

#[test]
fn request_split_byte_by_byte() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    let wire: &[u8] = b"GET /frag HTTP/1.1\r\nHost: x\r\n\r\n";
    for byte in wire {
        run(&mut engine, &mut handler, &mut transport, &[*byte]);
    }

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 200 OK\r\n"), "{output:?}");
    assert!(output.ends_with("path=/frag"), "{output:?}");
}

#[test]
fn body_collected_across_reads() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_body_handler();
    let mut transport = TestTransport::default();

    run(
        &mut engine,
        &mut handler,
        &mut transport,
        b"POST /in HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\nhel",
    );
    assert_eq!(transport.output(CONN), "", "no dispatch before the body is complete");

    run(&mut engine, &mut handler, &mut transport, b"lowo");
    assert_eq!(transport.output(CONN), "");

    run(&mut engine, &mut handler, &mut transport, b"rld");
    let output = transport.output(CONN);
    assert!(output.ends_with("helloworld"), "{output:?}");
}

#[test]
fn pipelined_requests_share_a_connection() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /one HTTP/1.1\r\n\r\n");
    run(&mut engine, &mut handler, &mut transport, b"GET /two HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 2, "{output:?}");
    assert!(output.contains("path=/one"), "{output:?}");
    assert!(output.ends_with("path=/two"), "{output:?}");
    assert!(!transport.is_closed(CONN));
}

#[test]
fn http10_closes_by_default() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET / HTTP/1.0\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.0 200 OK\r\n"), "{output:?}");
    assert!(transport.is_closed(CONN));
}

#[test]
fn http10_keep_alive_stays_open() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n");

    assert!(!transport.is_closed(CONN));
}

#[test]
fn http11_connection_close_is_honored() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET / HTTP/1.1\r\nConnection: Close\r\n\r\n");

    assert!(transport.is_closed(CONN), "Connection token is case-insensitive");
}

#[test]
fn unsupported_major_version_gets_505() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET / HTTP/2.0\r\nHost: x\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 505 HTTP Version Not Supported\r\n"), "{output:?}");

    // The connection is still usable for a well-versioned request.
    run(&mut engine, &mut handler, &mut transport, b"GET /ok HTTP/1.1\r\n\r\n");
    let output = transport.output(CONN);
    assert!(output.ends_with("path=/ok"), "{output:?}");
}

#[test]
fn response_version_is_negotiated_down() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET / HTTP/1.9\r\nConnection: keep-alive\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 200 OK\r\n"), "{output:?}");
}

#[test]
fn path_is_decoded_with_encoded_slash_kept_distinct() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /a%2Fb/c%20d HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.ends_with("path=/a%2Fb/c d"), "{output:?}");
}

#[test]
fn query_is_kept_raw() {
    let mut engine = HttpEngine::new();
    let mut handler = make_handler(|request, _response| {
        Ok(ReturnValue::Text(format!("query={}", request.query().unwrap_or("<none>"))))
    });
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /p?x=%20y HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.ends_with("query=x=%20y"), "{output:?}");
}

#[test]
fn fragment_in_target_is_rejected() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /x#frag HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{output:?}");
    assert!(output.contains("<h1>400 Bad Request</h1>"), "{output:?}");
    assert!(engine.entry_mut(CONN).is_none(), "no exchange survives a malformed request");
}

#[test]
fn malformed_request_line_gets_400() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"NONSENSE\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{output:?}");
}

#[test]
fn oversized_header_section_gets_400() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_path_handler();
    let mut transport = TestTransport::default();

    // No blank line ever arrives.
    let wire = vec![b'a'; MAX_HEADER_BYTES + 1];
    run(&mut engine, &mut handler, &mut transport, &wire);

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{output:?}");
}

#[test]
fn expect_continue_interleaves_an_interim_response() {
    let mut engine = HttpEngine::new();
    let mut handler = echo_body_handler();
    let mut transport = TestTransport::default();

    let head = indoc! {"
        POST /up HTTP/1.1\r
        Content-Length: 5\r
        Expect: 100-continue\r
        \r
    "};
    run(&mut engine, &mut handler, &mut transport, head.as_bytes());
    assert_eq!(transport.output(CONN), "HTTP/1.1 100 Continue\r\n\r\n");

    run(&mut engine, &mut handler, &mut transport, b"12345");
    let output = transport.output(CONN);
    assert!(output.contains("HTTP/1.1 200 OK\r\n"), "{output:?}");
    assert!(output.ends_with("12345"), "{output:?}");
    assert!(!transport.is_closed(CONN));
}

#[test]
fn oversized_entity_gets_413_and_close() {
    let mut engine = HttpEngine::new().with_max_entity(8);
    let mut handler = echo_body_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"POST /up HTTP/1.1\r\nContent-Length: 100\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{output:?}");
    assert!(output.contains("connection: close\r\n"), "{output:?}");
    assert!(transport.is_closed(CONN));
    assert!(engine.entry_mut(CONN).is_none());
}

fn measure_body_handler() -> impl Handler {
    make_handler(|request, _response| {
        Ok(ReturnValue::Text(format!(
            "len={} body={}",
            request.body().len(),
            String::from_utf8_lossy(request.body())
        )))
    })
}

#[test]
fn overlong_body_is_truncated_to_declared_length() {
    let mut engine = HttpEngine::new();
    let mut handler = measure_body_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"POST /up HTTP/1.1\r\nContent-Length: 3\r\n\r\n12345");

    let output = transport.output(CONN);
    assert!(output.ends_with("len=3 body=123"), "{output:?}");
}

#[test]
fn overlong_body_across_reads_is_truncated() {
    let mut engine = HttpEngine::new();
    let mut handler = measure_body_handler();
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"POST /up HTTP/1.1\r\nContent-Length: 3\r\n\r\n");
    assert_eq!(transport.output(CONN), "");

    run(&mut engine, &mut handler, &mut transport, b"12345");

    let output = transport.output(CONN);
    assert!(output.ends_with("len=3 body=123"), "{output:?}");
}

struct ChunkStream {
    chunks: std::collections::VecDeque<Bytes>,
    released: Arc<AtomicUsize>,
}

impl BodyStream for ChunkStream {
    fn next_chunk(&mut self) -> Option<Bytes> {
        self.chunks.pop_front()
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn stream_handler(released: Arc<AtomicUsize>) -> impl Handler {
    make_handler(move |_request, response: &mut Response| {
        response.set_stream(Box::new(ChunkStream {
            chunks: [Bytes::from_static(b"abc"), Bytes::from_static(b"de")].into_iter().collect(),
            released: released.clone(),
        }));
        Ok(ReturnValue::Handled)
    })
}

#[test]
fn streamed_response_is_chunk_framed_under_http11() {
    let mut engine = HttpEngine::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut handler = stream_handler(released.clone());
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /stream HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    let (head, payload) = split_head(&output);
    assert!(head.contains("transfer-encoding: chunked"), "{head:?}");
    assert_eq!(payload, "3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
    assert_eq!(released.load(Ordering::SeqCst), 1, "stream released exactly once");
    assert!(!transport.is_closed(CONN));
}

#[test]
fn streamed_response_is_raw_under_http10() {
    let mut engine = HttpEngine::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut handler = stream_handler(released.clone());
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /stream HTTP/1.0\r\n\r\n");

    let output = transport.output(CONN);
    let (head, payload) = split_head(&output);
    assert!(!head.contains("transfer-encoding"), "{head:?}");
    assert_eq!(payload, "abcde");
    assert!(transport.is_closed(CONN), "close delimits the raw streamed body");
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_pump_step_after_disconnect_is_dropped() {
    let mut engine = HttpEngine::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut handler = stream_handler(released.clone());

    engine.on_read(CONN, Bytes::from_static(b"GET /stream HTTP/1.1\r\n\r\n"));

    // Drain by hand so the disconnect lands between two pump steps.
    let Some(Event::Ready { conn }) = engine.poll_event() else { panic!("expected ready") };
    let (request, response) = engine.entry_mut(conn).unwrap();
    let outcome = handler.handle(request, response).unwrap();
    engine.on_outcome(conn, Outcome::Success(outcome));

    let Some(Event::Write { .. }) = engine.poll_event() else { panic!("expected head write") };
    let Some(Event::Stream { conn, chunk }) = engine.poll_event() else { panic!("expected pump step") };

    engine.on_disconnect(conn);
    assert_eq!(released.load(Ordering::SeqCst), 1, "abandoned stream released on disconnect");

    engine.pump(conn, chunk);
    assert!(engine.poll_event().is_none(), "stale step produces nothing");
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn unclaimed_request_falls_through_to_404() {
    let mut engine = HttpEngine::new();
    let mut handler = make_handler(|_request, _response| Ok(ReturnValue::None));
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /missing HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 404 Not Found\r\n"), "{output:?}");
    assert!(output.contains("content-type: text/html"), "{output:?}");
    assert!(output.contains("<p>/missing</p>"), "{output:?}");
}

#[test]
fn handler_failure_becomes_500() {
    let mut engine = HttpEngine::new();
    let mut handler = make_handler(|_request, _response| Err("boom".into()));
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET / HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{output:?}");
    assert!(output.contains("<p>Request Failed</p>"), "{output:?}");
}

#[test]
fn handler_can_short_circuit_with_an_http_error() {
    let mut engine = HttpEngine::new();
    let mut handler = make_handler(|request, _response| {
        Ok(ReturnValue::Error(
            HttpError::new(request.conn(), StatusCode::FORBIDDEN).with_message("members only"),
        ))
    });
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /vault HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 403 Forbidden\r\n"), "{output:?}");
    assert!(output.contains("<p>members only</p>"), "{output:?}");
}

#[test]
fn replacement_response_keeps_negotiated_version_and_close() {
    let mut engine = HttpEngine::new();
    let mut handler = make_handler(|request, _response| {
        let mut replacement = Response::new(request.conn());
        replacement.set_status(StatusCode::CREATED);
        replacement.set_body("made");
        Ok(ReturnValue::Response(replacement))
    });
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"PUT /thing HTTP/1.0\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.0 201 Created\r\n"), "{output:?}");
    assert!(output.ends_with("made"), "{output:?}");
    assert!(transport.is_closed(CONN));
}

struct TextHook;

impl ErrorHook for TextHook {
    fn on_error(&mut self, error: &HttpError) -> Option<ErrorOverride> {
        (error.status() == StatusCode::NOT_FOUND).then(|| ErrorOverride::Text("gone fishing".to_owned()))
    }
}

#[test]
fn error_hook_overrides_the_default_page() {
    let mut engine = HttpEngine::new().with_error_hook(Box::new(TextHook));
    let mut handler = make_handler(|_request, _response| Ok(ReturnValue::None));
    let mut transport = TestTransport::default();

    run(&mut engine, &mut handler, &mut transport, b"GET /missing HTTP/1.1\r\n\r\n");

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 404 Not Found\r\n"), "{output:?}");
    assert!(output.ends_with("gone fishing"), "{output:?}");
    assert!(!output.contains("<h1>"), "{output:?}");
}

#[test]
fn too_large_signal_mid_stream_releases_the_body() {
    let mut engine = HttpEngine::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut handler = stream_handler(released.clone());

    engine.on_read(CONN, Bytes::from_static(b"GET /stream HTTP/1.1\r\n\r\n"));

    let Some(Event::Ready { conn }) = engine.poll_event() else { panic!("expected ready") };
    let (request, response) = engine.entry_mut(conn).unwrap();
    let outcome = handler.handle(request, response).unwrap();
    engine.on_outcome(conn, Outcome::Success(outcome));

    // The 413 lands while the stream is still being pumped.
    engine.on_too_large(conn);
    assert_eq!(released.load(Ordering::SeqCst), 1, "abandoned stream released exactly once");
    assert!(engine.entry_mut(conn).is_none());
}

#[test]
fn explicit_too_large_signal() {
    let mut engine = HttpEngine::new();
    let mut transport = TestTransport::default();
    let mut handler = echo_path_handler();

    engine.on_too_large(CONN);
    drive(&mut engine, &mut handler, &mut transport);

    let output = transport.output(CONN);
    assert!(output.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{output:?}");
    assert!(transport.is_closed(CONN));
}
