//! Application-side request handling.
//!
//! A [`Handler`] receives each fully assembled request together with its
//! prepared response and reports back a [`ReturnValue`]; the engine's
//! dispatch policy turns that report into wire effects. Closures are adapted
//! through [`make_handler`].

use crate::engine::ReturnValue;
use crate::protocol::{BoxError, Request, Response};

/// Processes one assembled request.
///
/// The handler may mutate the response in place (status, headers, streamed
/// body) and return [`ReturnValue::Handled`], or return a value for the
/// engine to apply. An `Err` is reported as a dispatch failure and rendered
/// as a 500.
pub trait Handler {
    fn handle(&mut self, request: &mut Request, response: &mut Response) -> Result<ReturnValue, BoxError>;
}

/// Adapter implementing [`Handler`] for a closure.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandlerFn")
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: FnMut(&mut Request, &mut Response) -> Result<ReturnValue, BoxError>,
{
    fn handle(&mut self, request: &mut Request, response: &mut Response) -> Result<ReturnValue, BoxError> {
        (self.f)(request, response)
    }
}

/// Wraps a closure as a [`Handler`].
pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: FnMut(&mut Request, &mut Response) -> Result<ReturnValue, BoxError>,
{
    HandlerFn { f }
}
