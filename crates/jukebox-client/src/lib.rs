//! Realtime synchronization client for the jukebox server.
//!
//! A [`Session`] owns every piece of client state: the reconnecting
//! transport, the request dispatcher, the reply router, the server-backed
//! stores, the results paginator and the stream toggle.  Background tasks
//! (socket I/O, polling timers, play requests) never touch that state; they
//! post [`ClientEvent`]s onto one channel which the owner drains through
//! [`Session::handle_event`].  Front-ends subscribe to [`SessionEvent`]s to
//! learn what changed.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod notify;
pub mod paginator;
pub mod playlist;
pub mod router;
pub mod session;
pub mod stores;
pub mod stream;
pub mod transport;

pub use error::ClientError;
pub use event::{Action, ClientEvent, SessionEvent, TransportEvent};
pub use session::{Session, Stores};
