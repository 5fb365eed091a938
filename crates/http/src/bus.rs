//! Event substrate connecting the engine to its collaborators.
//!
//! The engine never touches a socket. It consumes inbound byte chunks and
//! produces [`Event`]s onto an [`EventBus`]; a driver loop (see
//! [`crate::server`]) routes `Write`/`Close` events to a
//! [`Transport`](crate::transport::Transport), feeds `Stream` events back into
//! the engine's pump step and hands `Ready` events to the application layer.
//!
//! The bus is a plain FIFO queue. Events for the same connection are processed
//! in the order they were enqueued; a single global FIFO trivially satisfies
//! that. Cross-connection ordering is unspecified and nothing may rely on it.

use std::collections::VecDeque;

use bytes::Bytes;

/// Identifies one transport connection.
///
/// The transport assigns these; the engine only ever uses them as keys into
/// its connection table and as the address for outbound writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for ConnId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A unit of work produced by the engine.
#[derive(Debug)]
pub enum Event {
    /// Outbound bytes for the transport.
    Write { conn: ConnId, data: Bytes },

    /// The connection must be closed once pending writes are flushed.
    Close { conn: ConnId },

    /// One streaming pump step, carrying the element pulled on the previous
    /// step. `None` marks end of stream.
    ///
    /// Each `Stream` event does a bounded amount of work and re-enqueues
    /// itself while the body has more elements, so one large streamed
    /// response cannot monopolize the loop.
    Stream { conn: ConnId, chunk: Option<Bytes> },

    /// A fully assembled request is ready for application dispatch.
    Ready { conn: ConnId },
}

/// FIFO queue of engine events.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }
}
