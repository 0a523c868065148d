//! The reactor loop: readiness polling, event demultiplexing, handler
//! dispatch, and connection lifecycle.
//!
//! Connections live in a dense `Vec` (`connections`), compacted with
//! `swap_remove` on close so iteration never walks a hole. Because
//! `swap_remove` moves the last element into the removed slot, every
//! connection's `mio::Token` maps to a *slot index* that can change out from
//! under it; `sources` is the indirection that keeps `mio`'s token (a
//! concern of registration, never reused while the source is live) decoupled
//! from our vector index (a concern of storage, reused the moment something
//! is swapped into it): any code that needs to find a connection later looks
//! it up through `sources` again rather than holding onto a slot index across
//! a dispatch boundary.
//!
//! Every path that ends a connection's life funnels through [`Reactor::close_slot`],
//! which fires the terminal close event (and, for errored/timeout closes,
//! the event that precedes it) before the record is actually removed. No
//! other call site fires its own one-off close event.

use std::{any::Any, collections::HashMap, io::Read as _, io::Write as _, time::Duration};

use mio::{Events, Interest, Poll, Token};
use reactor_utils::safe_panic;
use tracing::warn;

use crate::{
    clock::{now_ticks, Tick},
    diagnostics,
    error::{ConfigurationError, FatalPollError, RegisterError, SocketSetupError},
    service::{
        ConnectionHandlers, ConnectionInfo, EventKind, Handler, LifecycleEvent, Service, UnifiedHandler, WantInterest,
    },
    socket::{self, AcceptOutcome, MAX_RECEIVE},
    timer_wheel::{TimerLink, TimerLinks, TimerWheel},
};

/// Hard ceiling on live connections. Checked *before* a new connection is
/// admitted, not after — incrementing the count and only then rejecting
/// overflow would let one accept slip in past the limit every time the wheel
/// fills up exactly on a boundary.
pub const MAX_CONNECTIONS: usize = 16_384;

/// Default time a connection may sit idle (no `READABLE`/`WRITABLE` event)
/// before it is closed with `TIMEOUT`.
pub const DEFAULT_INACTIVITY_TICKS: Tick = 60 * crate::clock::TICKS_PER_SECOND;

#[derive(Clone, Copy)]
enum Source {
    Listener(usize),
    Connection(usize),
}

/// Owned snapshot of the readiness bits we care about, taken immediately
/// while iterating `mio::Events` so the borrow of `self.events` ends before
/// dispatch starts mutating connection state.
#[derive(Clone, Copy)]
struct ReadyFlags {
    readable: bool,
    writable: bool,
    error: bool,
    read_closed: bool,
}

impl From<&mio::event::Event> for ReadyFlags {
    fn from(event: &mio::event::Event) -> Self {
        Self {
            readable: event.is_readable(),
            writable: event.is_writable(),
            error: event.is_error(),
            read_closed: event.is_read_closed(),
        }
    }
}

/// Tracks which readiness a connection is currently registered for with
/// `mio`, kept separate from [`ConnectionRecord`] so [`ConnCtx`] can flip
/// interest without needing write access to the record's business fields.
struct ReadinessDesc {
    want: WantInterest,
}

struct ConnectionRecord {
    stream: mio::net::TcpStream,
    token: Token,
    service_index: usize,
    peer_addr: String,
    peer_port: String,
    user_data: Option<Box<dyn Any + Send>>,
    /// Set by [`ConnCtx::close`]; checked after every callback that doesn't
    /// otherwise have a way to request termination (`ConnectionHandlers::on_event`
    /// returns `()`).
    closing: bool,
    inactivity_link: TimerLink,
    sleep_link: TimerLink,
    receive_link: TimerLink,
}

enum WhichWheel {
    Inactivity,
    Sleep,
    Receive,
}

struct WheelLinks<'a> {
    connections: &'a mut Vec<ConnectionRecord>,
    which: WhichWheel,
}

impl TimerLinks for WheelLinks<'_> {
    fn link_mut(&mut self, slot: usize) -> &mut TimerLink {
        let record = &mut self.connections[slot];
        match self.which {
            WhichWheel::Inactivity => &mut record.inactivity_link,
            WhichWheel::Sleep => &mut record.sleep_link,
            WhichWheel::Receive => &mut record.receive_link,
        }
    }
}

/// Why a connection is being removed. Drives which event(s)
/// [`Reactor::deliver_close_sequence`] fires before the record is dropped.
#[derive(Clone, Copy)]
enum CloseReason {
    /// Peer FIN, or the handler itself asked to close. A handler-requested
    /// close is treated identically to a clean peer close.
    Graceful,
    Errored,
    TimeoutInactivity,
    TimeoutReceive,
}

impl CloseReason {
    fn is_error(self) -> bool {
        matches!(self, Self::Errored)
    }

    fn unified_preliminary(self) -> Option<EventKind> {
        match self {
            Self::Graceful => None,
            Self::Errored => Some(EventKind::ERRORED),
            Self::TimeoutInactivity | Self::TimeoutReceive => Some(EventKind::TIMEOUT),
        }
    }

    /// The three-callback style never observes `ERRORED` as its own event;
    /// an errored connection reaches it only through `END_CONNECTION`.
    fn split_preliminary(self) -> Option<LifecycleEvent> {
        match self {
            Self::Graceful | Self::Errored => None,
            Self::TimeoutInactivity => Some(LifecycleEvent::TimeoutInactivity),
            Self::TimeoutReceive => Some(LifecycleEvent::TimeoutReceive),
        }
    }
}

/// Disjoint-borrow facade handed to handlers mid-dispatch: just enough of
/// the reactor to send bytes and re-arm interest, never the whole `Reactor`.
/// `&Registry` plus the one connection being serviced, never `&mut self` on
/// the owning type.
pub struct ConnCtx<'a> {
    registry: &'a mio::Registry,
    readiness: &'a mut ReadinessDesc,
    record: &'a mut ConnectionRecord,
}

impl ConnCtx<'_> {
    /// Writes as much of `buf` as the socket will currently accept.
    /// `WouldBlock` re-arms `WRITABLE` and is reported as `Ok(0)`, not an
    /// error — the caller is expected to retry once `WRITABLE` fires.
    pub fn send(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.record.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.rearm(WantInterest::Writable)?;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Switches which readiness this connection is registered for.
    pub fn rearm(&mut self, want: WantInterest) -> std::io::Result<()> {
        if self.readiness.want == want {
            return Ok(());
        }
        self.registry.reregister(&mut self.record.stream, self.record.token, want.to_mio())?;
        self.readiness.want = want;
        Ok(())
    }

    /// Marks this connection to be torn down once the current callback
    /// returns. The only way `ConnectionHandlers::on_event` — whose return
    /// type carries no signal — can request a close; `on_receive`/
    /// `on_writable`'s `Err(())` remains the usual way for those two, and
    /// `UnifiedHandler::handle`'s `Err(())` already works for every event it
    /// sees.
    pub fn close(&mut self) {
        self.record.closing = true;
    }

    /// Attaches handler-owned data to this connection's slot, replacing
    /// whatever was attached before. The idiomatic-Rust stand-in for the C
    /// API's `void *userdata` threaded through every callback: drop glue
    /// frees it automatically when the connection closes, rather than
    /// requiring the handler to `free()` it on `CLOSED`.
    pub fn set_userdata(&mut self, data: Box<dyn Any + Send>) {
        self.record.user_data = Some(data);
    }

    pub fn userdata(&self) -> Option<&(dyn Any + Send)> {
        self.record.user_data.as_deref()
    }

    pub fn userdata_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.record.user_data.as_deref_mut()
    }

    /// Removes this connection's attached data, downcast to `T`. Lets a
    /// handler mutate its own per-connection state across several `send`
    /// calls within one callback without holding a borrow of `ctx` open
    /// across them: take it out, work with a plain `&mut T`, then hand it
    /// back via `set_userdata` once done.
    pub fn take_userdata<T: Any + Send>(&mut self) -> Option<T> {
        self.record.user_data.take()?.downcast::<T>().ok().map(|b| *b)
    }
}

/// The event-driven TCP connection dispatcher.
pub struct Reactor {
    poll: Poll,
    events: Events,
    services: Vec<Service>,
    connections: Vec<ConnectionRecord>,
    readiness: Vec<ReadinessDesc>,
    sources: HashMap<Token, Source>,
    next_token: usize,
    inactivity_wheel: TimerWheel,
    sleep_wheel: TimerWheel,
    receive_wheel: TimerWheel,
    now: Tick,
    inactivity_timeout: Tick,
    read_buf: Vec<u8>,
    poll_retry_budget: u32,
}

impl Reactor {
    pub fn create() -> std::io::Result<Self> {
        let now = now_ticks();
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            services: Vec::new(),
            connections: Vec::new(),
            readiness: Vec::new(),
            sources: HashMap::new(),
            next_token: 0,
            inactivity_wheel: TimerWheel::create(now),
            sleep_wheel: TimerWheel::create(now),
            receive_wheel: TimerWheel::create(now),
            now,
            inactivity_timeout: DEFAULT_INACTIVITY_TICKS,
            read_buf: vec![0_u8; MAX_RECEIVE],
            poll_retry_budget: 5,
        })
    }

    pub fn set_inactivity_timeout(&mut self, ticks: Tick) {
        self.inactivity_timeout = ticks;
    }

    fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Registers a listening endpoint bound to the three-callback handler
    /// style, per `dispatch.h`'s `dispatcher_add_listener`.
    pub fn add_listener(
        &mut self,
        host: &str,
        port: u16,
        handler: Box<dyn ConnectionHandlers>,
        service_data: Option<Box<dyn Any + Send>>,
    ) -> Result<usize, RegisterError> {
        self.register_service(host, port, Handler::Split(handler), service_data)
    }

    /// Registers a listening endpoint bound to the unified handler style,
    /// per `dispatcher.h`'s `dispatcher_register_server`.
    pub fn register_server(
        &mut self,
        host: &str,
        port: u16,
        handler: Box<dyn UnifiedHandler>,
        service_data: Option<Box<dyn Any + Send>>,
    ) -> Result<usize, RegisterError> {
        self.register_service(host, port, Handler::Unified(handler), service_data)
    }

    fn register_service(
        &mut self,
        host: &str,
        port: u16,
        handler: Handler,
        service_data: Option<Box<dyn Any + Send>>,
    ) -> Result<usize, RegisterError> {
        if host.is_empty() {
            return Err(ConfigurationError::Resolve(
                host.to_string(),
                std::io::Error::other("empty host"),
            )
            .into());
        }
        let (mut listener, bound_host, bound_port) = socket::resolve_and_bind(host, port)?;
        let token = self.alloc_token();
        self.poll
            .registry()
            .register(&mut listener, token, Interest::READABLE)
            .map_err(SocketSetupError::Listen)?;

        let service_index = self.services.len();
        self.services.push(Service::new(listener, bound_host.clone(), bound_port.clone(), handler, service_data));
        self.sources.insert(token, Source::Listener(service_index));
        diagnostics::listening(&bound_host, &bound_port);
        Ok(service_index)
    }

    /// Runs one poll cycle with `timeout`, dispatching every ready
    /// socket event and draining whatever timers are due. Returns once all
    /// ready work for this cycle has been handled.
    pub fn dispatch(&mut self, timeout: Duration) -> Result<(), FatalPollError> {
        self.now = now_ticks();

        let mut attempts = 0_u32;
        loop {
            match self.poll.poll(&mut self.events, Some(timeout)) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    attempts += 1;
                    if attempts > self.poll_retry_budget {
                        return Err(FatalPollError::Poll { attempts, source: e });
                    }
                    warn!("poll() failed (attempt {attempts}/{}): {e}", self.poll_retry_budget);
                }
            }
        }

        let ready: Vec<(Token, ReadyFlags)> = self.events.iter().map(|e| (e.token(), ReadyFlags::from(e))).collect();
        for (token, flags) in ready {
            match self.sources.get(&token).copied() {
                Some(Source::Listener(service_index)) => self.accept_ready(service_index),
                Some(Source::Connection(_)) => self.dispatch_connection_event(token, flags),
                None => safe_panic!("got event for unknown token {token:?}"),
            }
        }

        self.drain_timers();
        Ok(())
    }

    fn accept_ready(&mut self, service_index: usize) {
        loop {
            if self.connections.len() >= MAX_CONNECTIONS {
                warn!("connection table full ({MAX_CONNECTIONS}), pausing accept");
                return;
            }
            let outcome = socket::accept_one(&self.services[service_index].listener);
            let (mut stream, peer_addr, peer_port) = match outcome {
                AcceptOutcome::Accepted { stream, peer_addr, peer_port } => (stream, peer_addr, peer_port),
                AcceptOutcome::WouldBlock | AcceptOutcome::TableExhausted => return,
            };

            let token = self.alloc_token();
            if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                warn!("failed to register accepted connection: {e}");
                continue;
            }

            let slot = self.connections.len();
            self.connections.push(ConnectionRecord {
                stream,
                token,
                service_index,
                peer_addr: peer_addr.clone(),
                peer_port: peer_port.clone(),
                user_data: None,
                closing: false,
                inactivity_link: TimerLink::new(),
                sleep_link: TimerLink::new(),
                receive_link: TimerLink::new(),
            });
            self.readiness.push(ReadinessDesc { want: WantInterest::Readable });
            self.sources.insert(token, Source::Connection(slot));
            self.inactivity_wheel.add(
                &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Inactivity },
                slot,
                self.now + self.inactivity_timeout,
            );

            diagnostics::connected(&peer_addr, &peer_port);
            if self.fire_event(slot, EventKind::CREATED) {
                self.close_slot(slot, CloseReason::Graceful);
            }
        }
    }

    fn dispatch_connection_event(&mut self, token: Token, flags: ReadyFlags) {
        let Some(&slot) = self.sources.get(&token).and_then(|s| match s {
            Source::Connection(slot) => Some(slot),
            Source::Listener(_) => None,
        }) else {
            return;
        };

        self.inactivity_wheel.add(
            &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Inactivity },
            slot,
            self.now + self.inactivity_timeout,
        );

        if flags.error {
            if let Ok(Some(errno)) = socket::pending_error(&self.connections[slot].stream) {
                warn!("connection {slot} errored, pending SO_ERROR {errno}");
            }
            self.close_slot(slot, CloseReason::Errored);
            return;
        }
        if flags.read_closed && !flags.readable {
            self.close_slot(slot, CloseReason::Graceful);
            return;
        }

        let mut reason = None;
        if flags.readable {
            reason = self.handle_readable(slot);
        }
        if reason.is_none() && flags.writable {
            reason = self.handle_writable(slot);
        }
        if let Some(reason) = reason {
            self.close_slot(slot, reason);
        }
    }

    /// Returns the reason to close the connection, if the read loop hit one.
    fn handle_readable(&mut self, slot: usize) -> Option<CloseReason> {
        loop {
            let n = match self.connections[slot].stream.read(&mut self.read_buf) {
                Ok(0) => return Some(CloseReason::Graceful),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return None,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Some(CloseReason::Errored),
            };

            let data = self.read_buf[..n].to_vec();
            if self.invoke_readable(slot, &data) {
                return Some(CloseReason::Graceful);
            }
            if n < self.read_buf.len() {
                return None;
            }
        }
    }

    fn invoke_readable(&mut self, slot: usize, data: &[u8]) -> bool {
        let peer_addr = self.connections[slot].peer_addr.clone();
        let peer_port = self.connections[slot].peer_port.clone();
        let service_index = self.connections[slot].service_index;
        let service = &mut self.services[service_index];
        let info = ConnectionInfo {
            slot,
            peer_addr: &peer_addr,
            peer_port: &peer_port,
            host_addr: &service.host,
            host_port: &service.port,
            service_data: service.service_data.as_deref(),
        };
        let mut ctx = ConnCtx { registry: self.poll.registry(), readiness: &mut self.readiness[slot], record: &mut self.connections[slot] };
        let result = match &mut service.handler {
            Handler::Split(h) => h.on_receive(&info, data, &mut ctx),
            Handler::Unified(h) => h.handle(&info, EventKind::READABLE, data, &mut ctx),
        };
        result.is_err() || self.connections[slot].closing
    }

    /// Returns the reason to close the connection, if the handler asked for one.
    fn handle_writable(&mut self, slot: usize) -> Option<CloseReason> {
        let peer_addr = self.connections[slot].peer_addr.clone();
        let peer_port = self.connections[slot].peer_port.clone();
        let service_index = self.connections[slot].service_index;
        let service = &mut self.services[service_index];
        let info = ConnectionInfo {
            slot,
            peer_addr: &peer_addr,
            peer_port: &peer_port,
            host_addr: &service.host,
            host_port: &service.port,
            service_data: service.service_data.as_deref(),
        };
        let mut ctx = ConnCtx { registry: self.poll.registry(), readiness: &mut self.readiness[slot], record: &mut self.connections[slot] };
        let result = match &mut service.handler {
            Handler::Split(h) => h.on_writable(&info, &mut ctx).map(|_| ()),
            Handler::Unified(h) => h.handle(&info, EventKind::WRITABLE, &[], &mut ctx),
        };
        (result.is_err() || self.connections[slot].closing).then_some(CloseReason::Graceful)
    }

    /// Fires a non-terminal event (`CREATED` or `SLEEP`) at `slot` and
    /// reports whether the handler asked to close the connection in
    /// response — either by returning `Err` (`UnifiedHandler`) or by
    /// calling [`ConnCtx::close`] (the only way `ConnectionHandlers::on_event`
    /// has, since it returns `()`). `TIMEOUT`/`ERRORED`/`CLOSED` always go
    /// through [`Self::close_slot`] instead, since those are always
    /// terminal.
    fn fire_event(&mut self, slot: usize, event: EventKind) -> bool {
        debug_assert!(matches!(event, EventKind::CREATED | EventKind::SLEEP));
        let peer_addr = self.connections[slot].peer_addr.clone();
        let peer_port = self.connections[slot].peer_port.clone();
        let service_index = self.connections[slot].service_index;
        let service = &mut self.services[service_index];
        let info = ConnectionInfo {
            slot,
            peer_addr: &peer_addr,
            peer_port: &peer_port,
            host_addr: &service.host,
            host_port: &service.port,
            service_data: service.service_data.as_deref(),
        };
        let mut ctx = ConnCtx { registry: self.poll.registry(), readiness: &mut self.readiness[slot], record: &mut self.connections[slot] };
        let handler_requested_close = match &mut service.handler {
            Handler::Split(h) => {
                let lifecycle =
                    if event == EventKind::CREATED { LifecycleEvent::NewConnection } else { LifecycleEvent::TimeoutSleep };
                h.on_event(&info, lifecycle, &mut ctx);
                false
            }
            Handler::Unified(h) => h.handle(&info, event, &[], &mut ctx).is_err(),
        };
        handler_requested_close || self.connections[slot].closing
    }

    /// Delivers the terminal close event — and, for errored/timeout closes,
    /// the event that precedes it — to the handler at `slot`, mirroring the
    /// original `connection_remove`'s unconditional "fire the lifecycle
    /// event first" step. Never itself triggers another close: by the time
    /// this runs, `slot` is being removed regardless of what the handler
    /// does in response.
    fn deliver_close_sequence(&mut self, slot: usize, reason: CloseReason) {
        let peer_addr = self.connections[slot].peer_addr.clone();
        let peer_port = self.connections[slot].peer_port.clone();
        let service_index = self.connections[slot].service_index;
        let service = &mut self.services[service_index];
        let info = ConnectionInfo {
            slot,
            peer_addr: &peer_addr,
            peer_port: &peer_port,
            host_addr: &service.host,
            host_port: &service.port,
            service_data: service.service_data.as_deref(),
        };
        let mut ctx = ConnCtx { registry: self.poll.registry(), readiness: &mut self.readiness[slot], record: &mut self.connections[slot] };

        match &mut service.handler {
            Handler::Split(h) => {
                if let Some(preliminary) = reason.split_preliminary() {
                    h.on_event(&info, preliminary, &mut ctx);
                }
                h.on_event(&info, LifecycleEvent::EndConnection, &mut ctx);
            }
            Handler::Unified(h) => {
                if let Some(preliminary) = reason.unified_preliminary() {
                    let _ = h.handle(&info, preliminary, &[], &mut ctx);
                }
                let _ = h.handle(&info, EventKind::CLOSED, &[], &mut ctx);
            }
        }

        if reason.is_error() {
            diagnostics::disconnected_with_error(&peer_addr, &peer_port);
        } else {
            diagnostics::disconnected_gracefully(&peer_addr, &peer_port);
        }
    }

    /// Exposes a send/rearm facade for the connection at `slot`, for use
    /// from inside a handler callback that was invoked by this same
    /// dispatch cycle.
    pub fn conn_ctx(&mut self, slot: usize) -> ConnCtx<'_> {
        ConnCtx {
            registry: self.poll.registry(),
            readiness: &mut self.readiness[slot],
            record: &mut self.connections[slot],
        }
    }

    pub fn set_userdata(&mut self, slot: usize, data: Box<dyn Any + Send>) {
        if let Some(record) = self.connections.get_mut(slot) {
            record.user_data = Some(data);
        }
    }

    pub fn userdata(&self, slot: usize) -> Option<&(dyn Any + Send)> {
        self.connections.get(slot).and_then(|r| r.user_data.as_deref())
    }

    /// `(peer_addr, peer_port, host_addr, host_port)`: the connection's own
    /// peer address/port, and the bound listening service's address/port it
    /// was accepted on.
    pub fn get_addrs(&self, slot: usize) -> Option<(&str, &str, &str, &str)> {
        let record = self.connections.get(slot)?;
        let service = self.services.get(record.service_index)?;
        Some((record.peer_addr.as_str(), record.peer_port.as_str(), service.host.as_str(), service.port.as_str()))
    }

    /// Closes the connection at `slot` immediately, treated identically to
    /// a clean peer close.
    pub fn close_connection(&mut self, slot: usize) {
        self.close_slot(slot, CloseReason::Graceful);
    }

    /// Removes the connection at `slot`, after unconditionally delivering
    /// its terminal close event (see [`Self::deliver_close_sequence`]).
    fn close_slot(&mut self, slot: usize, reason: CloseReason) {
        if slot >= self.connections.len() {
            return;
        }
        self.deliver_close_sequence(slot, reason);

        let mut record = self.connections.swap_remove(slot);
        self.readiness.swap_remove(slot);
        self.sources.remove(&record.token);
        let _ = self.poll.registry().deregister(&mut record.stream);

        self.inactivity_wheel
            .unlink(&mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Inactivity }, slot);
        self.sleep_wheel
            .unlink(&mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Sleep }, slot);
        self.receive_wheel
            .unlink(&mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Receive }, slot);

        // The element that used to be at the end is now at `slot`; its
        // token still points at the old index everywhere we cached it.
        if slot < self.connections.len() {
            let moved_token = self.connections[slot].token;
            self.sources.insert(moved_token, Source::Connection(slot));
        }
    }

    fn drain_timers(&mut self) {
        while let Some(slot) = self.inactivity_wheel.remove_expired(
            &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Inactivity },
            self.now,
        ) {
            self.close_slot(slot, CloseReason::TimeoutInactivity);
        }

        while let Some(slot) = self.sleep_wheel.remove_expired(
            &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Sleep },
            self.now,
        ) {
            if self.fire_event(slot, EventKind::SLEEP) {
                self.close_slot(slot, CloseReason::Graceful);
            }
        }

        // The receive wheel carries per-request receive deadlines,
        // deliberately kept apart from the sleep wheel: the C source used
        // the sleep wheel for both, which meant an unrelated sleep timer
        // could be silently consumed as if it were a receive timeout.
        while let Some(slot) = self.receive_wheel.remove_expired(
            &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Receive },
            self.now,
        ) {
            self.close_slot(slot, CloseReason::TimeoutReceive);
        }
    }

    /// Arms a one-shot wake-up for `slot` that delivers `SLEEP` at
    /// `self.now + ticks`, independent of any I/O readiness.
    pub fn sleep_for(&mut self, slot: usize, ticks: Tick) {
        if slot >= self.connections.len() {
            return;
        }
        let now = self.now;
        self.sleep_wheel.add(
            &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Sleep },
            slot,
            now + ticks,
        );
    }

    /// Arms a receive deadline for `slot`: if no `READABLE` event completes
    /// the pending request within `ticks`, `TIMEOUT` fires and the
    /// connection is closed.
    pub fn set_receive_timeout(&mut self, slot: usize, ticks: Tick) {
        if slot >= self.connections.len() {
            return;
        }
        let now = self.now;
        self.receive_wheel.add(
            &mut WheelLinks { connections: &mut self.connections, which: WhichWheel::Receive },
            slot,
            now + ticks,
        );
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// The host/port a service actually bound to — useful after
    /// registering with port `0` and letting the OS pick one.
    pub fn service_addr(&self, service_index: usize) -> Option<(&str, &str)> {
        self.services.get(service_index).map(|s| (s.host.as_str(), s.port.as_str()))
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        // The C `dispatcher_destroy` leaked the service and connection
        // vectors; letting these drop normally here is the fix, not a
        // feature — every `TcpListener`/`TcpStream` closes its fd and every
        // handler's `Box` runs its destructor.
        for mut record in self.connections.drain(..) {
            let _ = self.poll.registry().deregister(&mut record.stream);
        }
        for mut service in self.services.drain(..) {
            let _ = self.poll.registry().deregister(&mut service.listener);
        }
    }
}
