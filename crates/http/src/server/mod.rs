//! Hosting: the event-drain loop and the tokio front end.
//!
//! [`drive`] is the synchronous core loop usable with any [`Transport`]
//! (tests use an in-memory one); [`serve`] binds it to tokio sockets.
//!
//! [`Transport`]: crate::transport::Transport

mod driver;
pub use driver::drive;

mod server;
pub use server::serve;
