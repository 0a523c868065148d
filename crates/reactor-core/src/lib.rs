//! Single-threaded, event-driven TCP connection dispatcher.
//!
//! A [`reactor::Reactor`] owns a set of listening [`service::Service`]s and
//! the connections they accept, polls readiness with `mio`, and drives each
//! connection's handler (either [`service::ConnectionHandlers`]'s three
//! callbacks or [`service::UnifiedHandler`]'s single bit-flagged one)
//! through its lifecycle: `CREATED` on accept, `READABLE`/`WRITABLE` as data
//! moves, `TIMEOUT`/`ERRORED`/`CLOSED`/`SLEEP` as the connection winds down.

pub mod clock;
pub mod diagnostics;
pub mod error;
pub mod reactor;
pub mod service;
pub mod socket;
pub mod timer_wheel;

pub use clock::{Tick, TICKS_PER_SECOND};
pub use error::{ConfigurationError, FatalPollError, RegisterError, SocketSetupError};
pub use reactor::{ConnCtx, Reactor, DEFAULT_INACTIVITY_TICKS, MAX_CONNECTIONS};
pub use service::{ConnectionHandlers, ConnectionInfo, EventKind, LifecycleEvent, UnifiedHandler, WantInterest};
