//! The event-drain loop connecting engine, handler and transport.

use tracing::trace;

use crate::bus::Event;
use crate::engine::{HttpEngine, Outcome};
use crate::handler::Handler;
use crate::transport::Transport;

/// Drains the engine's event queue to quiescence.
///
/// `Write` and `Close` go straight to the transport; `Stream` re-enters the
/// engine as a pump step; `Ready` dispatches the assembled request to the
/// handler and feeds the outcome back. Events produced while draining are
/// drained too, so after this returns the engine holds no pending work.
pub fn drive<H, T>(engine: &mut HttpEngine, handler: &mut H, transport: &mut T)
where
    H: Handler,
    T: Transport,
{
    while let Some(event) = engine.poll_event() {
        trace!(?event, "drive");
        match event {
            Event::Write { conn, data } => transport.write(conn, data),
            Event::Close { conn } => transport.close(conn),
            Event::Stream { conn, chunk } => engine.pump(conn, chunk),
            Event::Ready { conn } => {
                let outcome = match engine.entry_mut(conn) {
                    Some((request, response)) => match handler.handle(request, response) {
                        Ok(value) => Some(Outcome::Success(value)),
                        Err(cause) => Some(Outcome::Failed(cause)),
                    },
                    // Exchange evicted between scheduling and dispatch.
                    None => None,
                };
                if let Some(outcome) = outcome {
                    let failed = matches!(outcome, Outcome::Failed(_));
                    engine.on_outcome(conn, outcome);
                    if !failed {
                        engine.on_outcome(conn, Outcome::Completed { matched: true });
                    }
                }
            }
        }
    }
}
