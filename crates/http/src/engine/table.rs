//! Per-connection store of in-flight exchanges.
//!
//! Each connection has at most one (request, response) pair. A finished pair
//! (`done` response) is evicted lazily when the next bytes arrive, or
//! immediately on disconnect. Only the assembler and the disconnect handler
//! write to this table.

use std::collections::HashMap;

use crate::bus::ConnId;
use crate::protocol::{Request, Response};

/// One in-flight request/response pair.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

/// Keyed store mapping a connection to its single in-flight exchange.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    entries: HashMap<ConnId, Exchange>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, conn: ConnId, request: Request, response: Response) {
        self.entries.insert(conn, Exchange { request, response });
    }

    pub fn get(&self, conn: ConnId) -> Option<&Exchange> {
        self.entries.get(&conn)
    }

    pub fn get_mut(&mut self, conn: ConnId) -> Option<&mut Exchange> {
        self.entries.get_mut(&conn)
    }

    pub fn remove(&mut self, conn: ConnId) -> Option<Exchange> {
        self.entries.remove(&conn)
    }

    /// Removes the entry if its response has been fully emitted, making room
    /// for the next request on the connection.
    pub fn evict_done(&mut self, conn: ConnId) -> bool {
        if self.entries.get(&conn).is_some_and(|exchange| exchange.response.done()) {
            self.entries.remove(&conn);
            return true;
        }
        false
    }
}
