//! Service registry: listening endpoints bound to a handler and its data.
//!
//! A [`Service`] pairs one listening socket with the handler style the
//! original C API calls either `dispatch` (three callbacks) or `dispatcher`
//! (one callback, bit-flag event). Both styles are first-class here behind
//! [`Handler`]; [`Reactor::register_server`](crate::reactor::Reactor::register_server)
//! and [`Reactor::add_listener`](crate::reactor::Reactor::add_listener) pick
//! the variant that matches which trait the caller implements.

use bitflags::bitflags;
use std::any::Any;

use crate::reactor::ConnCtx;

bitflags! {
    /// Flags describing why a handler is being invoked. Exactly one bit is
    /// set per call: events are delivered one at a time, never ORed, so a
    /// handler never needs to peel multiple conditions apart itself.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EventKind: u32 {
        const READABLE = 0x01;
        const WRITABLE = 0x02;
        const TIMEOUT   = 0x04;
        const ERRORED   = 0x08;
        const CLOSED    = 0x10;
        const CREATED   = 0x20;
        const SLEEP     = 0x40;
    }
}

/// Which readiness a connection is currently waiting on. A connection is
/// always interested in exactly one of these, never both or neither — the
/// C API's `is_tx` boolean re-expressed as a type that can't hold an invalid
/// combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WantInterest {
    Readable,
    Writable,
}

impl WantInterest {
    pub(crate) fn to_mio(self) -> mio::Interest {
        match self {
            Self::Readable => mio::Interest::READABLE,
            Self::Writable => mio::Interest::WRITABLE,
        }
    }
}

/// Per-connection facts a handler can read back from the reactor: address,
/// service-scoped data, and whatever user data the handler itself attached
/// via `set_userdata`.
///
/// `#[non_exhaustive]` stands in for the C struct's `sizeof_struct` version
/// field: new read-only facts can be appended later without breaking
/// existing handler code, the same forward-compatibility the C API bought
/// itself by having callers report their struct's size.
#[non_exhaustive]
pub struct ConnectionInfo<'a> {
    pub slot: usize,
    pub peer_addr: &'a str,
    pub peer_port: &'a str,
    /// Address/port of the listening service this connection was accepted
    /// on — distinct from `peer_addr`/`peer_port`, which name the far end.
    pub host_addr: &'a str,
    pub host_port: &'a str,
    pub service_data: Option<&'a (dyn Any + Send)>,
}

/// The five lifecycle values the three-callback style's `on_event` can see.
/// Kept as its own enum rather than reusing [`EventKind`]'s bit-flags:
/// `EventKind`'s layout is fixed by the unified style's wire contract (one
/// bit per value, `TIMEOUT` covering every timer), while the split style
/// needs `TIMEOUT_INACTIVITY` and `TIMEOUT_RECEIVE` to be told apart, and
/// never observes `ERRORED` as a value of its own — an errored connection
/// reaches a `ConnectionHandlers` implementation only through
/// `EndConnection`, same as any other close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    NewConnection,
    EndConnection,
    TimeoutInactivity,
    TimeoutSleep,
    TimeoutReceive,
}

/// The three-callback handler style (`on_receive` / `on_writable` /
/// `on_event`), modeled on `dispatch.h`'s `DISPATCHER_RECV` / `_SEND` /
/// `_EVENT` typedefs. `on_receive` and `on_writable` exist because those two
/// paths carry payload bytes that `on_event`'s single bit-flag can't; every
/// other occurrence (timeout, close, creation, sleep) goes through
/// `on_event`.
pub trait ConnectionHandlers: Send {
    /// Bytes arrived. `data` is whatever this read syscall returned, up to
    /// 65536 bytes; any buffering across calls (e.g. line splitting) is the
    /// handler's own business. Return `Err(())` to request the connection be
    /// closed. `ctx` is how a handler talks back — `ctx.send` to reply,
    /// `ctx.rearm` to switch which readiness it waits on next.
    fn on_receive(&mut self, info: &ConnectionInfo<'_>, data: &[u8], ctx: &mut ConnCtx<'_>) -> Result<(), ()>;

    /// The socket can accept more bytes. Returning `Ok(true)` keeps the
    /// connection armed for `WRITABLE`; `Ok(false)` lets it fall back to
    /// `READABLE` until there's something new to send.
    fn on_writable(&mut self, info: &ConnectionInfo<'_>, ctx: &mut ConnCtx<'_>) -> Result<bool, ()>;

    /// Everything that isn't a data-bearing event. Has no `Result` return —
    /// use [`ConnCtx::close`] to request termination from here.
    fn on_event(&mut self, info: &ConnectionInfo<'_>, event: LifecycleEvent, ctx: &mut ConnCtx<'_>);
}

/// The unified handler style (`dispatcher.h`'s single `dispatch_handler`
/// callback): one entry point, the event tells you why you were called.
/// `data` is only non-empty on `READABLE`.
pub trait UnifiedHandler: Send {
    /// Return `Err(())` to request the connection be closed after this call
    /// returns, regardless of `event`.
    fn handle(
        &mut self,
        info: &ConnectionInfo<'_>,
        event: EventKind,
        data: &[u8],
        ctx: &mut ConnCtx<'_>,
    ) -> Result<(), ()>;
}

/// Which calling convention a service's handler uses.
pub enum Handler {
    Split(Box<dyn ConnectionHandlers>),
    Unified(Box<dyn UnifiedHandler>),
}

/// One listening endpoint: its socket, its handler, and any data the
/// handler wants attached to every connection this service accepts
/// (`ConnectionInfo::service_data`).
pub struct Service {
    pub(crate) listener: mio::net::TcpListener,
    pub(crate) host: String,
    pub(crate) port: String,
    pub(crate) handler: Handler,
    pub(crate) service_data: Option<Box<dyn Any + Send>>,
}

impl Service {
    pub(crate) fn new(
        listener: mio::net::TcpListener,
        host: String,
        port: String,
        handler: Handler,
        service_data: Option<Box<dyn Any + Send>>,
    ) -> Self {
        Self { listener, host, port, handler, service_data }
    }
}
