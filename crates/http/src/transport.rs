//! Outbound side of the external transport.
//!
//! The engine emits `Write` and `Close` events; whoever drives the engine
//! implements this trait to deliver them. The tokio server in
//! [`crate::server`] forwards them to per-connection writer tasks, tests use
//! a recording double.

use bytes::Bytes;

use crate::bus::ConnId;

/// Write/close primitives of the underlying transport.
///
/// Implementations must preserve per-connection write order. Writes to a
/// connection that is already gone may be silently dropped.
pub trait Transport {
    fn write(&mut self, conn: ConnId, data: Bytes);

    fn close(&mut self, conn: ConnId);
}
