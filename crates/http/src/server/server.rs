//! Tokio front end.
//!
//! Sockets are read and written by per-connection tasks; the engine itself
//! runs in a single task that owns all protocol state, so no connection
//! state is ever shared across threads. Reader tasks forward raw chunks over
//! an mpsc channel, and a [`ChannelTransport`] routes the engine's output
//! back to the matching writer task.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::driver::drive;
use crate::bus::ConnId;
use crate::engine::HttpEngine;
use crate::handler::Handler;
use crate::transport::Transport;

/// Read buffer size for each connection.
const READ_BUF_SIZE: usize = 8 * 1024;

/// Message from a reader task to the engine task.
enum Inbound {
    Data(ConnId, Bytes),
    Disconnected(ConnId),
}

/// Message from the engine task to a writer task.
enum Outbound {
    Data(Bytes),
    Shutdown,
}

/// Routes engine output to per-connection writer channels.
struct ChannelTransport {
    writers: HashMap<ConnId, mpsc::UnboundedSender<Outbound>>,
}

impl ChannelTransport {
    fn new() -> Self {
        Self { writers: HashMap::new() }
    }

    fn register(&mut self, conn: ConnId, sender: mpsc::UnboundedSender<Outbound>) {
        self.writers.insert(conn, sender);
    }

    fn unregister(&mut self, conn: ConnId) {
        self.writers.remove(&conn);
    }
}

impl Transport for ChannelTransport {
    fn write(&mut self, conn: ConnId, data: Bytes) {
        if let Some(sender) = self.writers.get(&conn) {
            // A send error means the writer is already gone; the disconnect
            // notification will clean up.
            let _ = sender.send(Outbound::Data(data));
        }
    }

    fn close(&mut self, conn: ConnId) {
        if let Some(sender) = self.writers.remove(&conn) {
            let _ = sender.send(Outbound::Shutdown);
        }
    }
}

/// Accepts connections on `listener` and serves them with `handler`.
///
/// Runs until the listener fails irrecoverably. Each accepted socket gets a
/// reader and a writer task; all protocol decisions happen on the engine
/// owned by this task.
pub async fn serve<H>(listener: TcpListener, mut engine: HttpEngine, mut handler: H) -> std::io::Result<()>
where
    H: Handler,
{
    let mut transport = ChannelTransport::new();
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<Inbound>();
    let mut next_conn: u64 = 0;

    let addr = listener.local_addr()?;
    info!(%addr, "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                };

                next_conn += 1;
                let conn = ConnId::new(next_conn);
                debug!(%conn, %remote_addr, "accepted");

                let (reader, writer) = stream.into_split();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Outbound>();
                transport.register(conn, outbound_tx);

                tokio::spawn(read_loop(conn, reader, inbound_tx.clone()));
                tokio::spawn(write_loop(conn, writer, outbound_rx));
            }

            message = inbound_rx.recv() => {
                // The engine task holds a sender, so the channel never
                // closes while we run.
                let Some(message) = message else { break };
                match message {
                    Inbound::Data(conn, data) => engine.on_read(conn, data),
                    Inbound::Disconnected(conn) => {
                        engine.on_disconnect(conn);
                        transport.unregister(conn);
                    }
                }
                drive(&mut engine, &mut handler, &mut transport);
            }
        }
    }

    Ok(())
}

async fn read_loop(conn: ConnId, mut reader: OwnedReadHalf, inbound: mpsc::UnboundedSender<Inbound>) {
    loop {
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
        match reader.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if inbound.send(Inbound::Data(conn, buf.freeze())).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(%conn, cause = %e, "read error");
                break;
            }
        }
    }
    let _ = inbound.send(Inbound::Disconnected(conn));
}

async fn write_loop(conn: ConnId, mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Data(data) => {
                if let Err(e) = writer.write_all(&data).await {
                    debug!(%conn, cause = %e, "write error");
                    break;
                }
            }
            Outbound::Shutdown => {
                let _ = writer.shutdown().await;
                break;
            }
        }
    }
}
