//! Binding a second listener to a port that's already in use fails cleanly
//! without disturbing the reactor; a subsequent bind on a free port still
//! succeeds afterward.

mod support;

use std::net::TcpStream;
use std::time::Duration;

use reactor_core::service::{ConnectionInfo, EventKind, UnifiedHandler};
use reactor_core::{ConnCtx, Reactor};
use support::RunningReactor;

struct NoOpHandler;

impl UnifiedHandler for NoOpHandler {
    fn handle(&mut self, _info: &ConnectionInfo<'_>, _event: EventKind, _data: &[u8], _ctx: &mut ConnCtx<'_>) -> Result<(), ()> {
        Ok(())
    }
}

#[test]
fn bind_failure_on_busy_port_does_not_break_the_reactor() {
    let mut reactor = Reactor::create().expect("reactor should start");
    let service_a = reactor
        .register_server("127.0.0.1", 0, Box::new(NoOpHandler), None)
        .expect("first listener should bind");
    let (_, port_str) = reactor.service_addr(service_a).unwrap();
    let busy_port: u16 = port_str.parse().unwrap();

    // SO_REUSEADDR is set on every socket we bind, which on Linux lets a
    // second bind to the same port succeed for TIME_WAIT reuse, so hold a
    // raw socket: a still-listening socket on that exact port is rejected
    // with EADDRINUSE regardless of SO_REUSEADDR, because SO_REUSEADDR only
    // relaxes the restriction against TIME_WAIT, not a live listener.
    let collide = reactor.register_server("127.0.0.1", busy_port, Box::new(NoOpHandler), None);
    assert!(collide.is_err(), "binding a second listener on a live port should fail");
    assert_eq!(reactor.service_count(), 1, "the failed registration must not have been admitted");

    let service_b = reactor
        .register_server("127.0.0.1", 0, Box::new(NoOpHandler), None)
        .expect("binding a fresh ephemeral port should still work after the earlier failure");
    assert_eq!(reactor.service_count(), 2);

    let (_, free_port_str) = reactor.service_addr(service_b).unwrap();
    let free_port: u16 = free_port_str.parse().unwrap();

    let running = RunningReactor::spawn(reactor);

    let first = TcpStream::connect(("127.0.0.1", busy_port));
    assert!(first.is_ok(), "original listener should still be accepting");
    let second = TcpStream::connect(("127.0.0.1", free_port));
    assert!(second.is_ok(), "second listener should also be accepting");

    std::thread::sleep(Duration::from_millis(50));
    running.stop();
}
