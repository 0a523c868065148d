//! `get_addrs` reports the full four-tuple contract: the peer's own
//! address/port alongside the listening service's bound address/port the
//! connection was accepted on, not just the peer half.

use std::net::TcpStream;
use std::time::{Duration, Instant};

use reactor_core::service::{ConnectionInfo, EventKind, UnifiedHandler};
use reactor_core::{ConnCtx, Reactor};

struct NoOpHandler;

impl UnifiedHandler for NoOpHandler {
    fn handle(&mut self, _info: &ConnectionInfo<'_>, _event: EventKind, _data: &[u8], _ctx: &mut ConnCtx<'_>) -> Result<(), ()> {
        Ok(())
    }
}

#[test]
fn get_addrs_reports_peer_and_host() {
    let mut reactor = Reactor::create().expect("reactor should start");
    let service = reactor
        .register_server("127.0.0.1", 0, Box::new(NoOpHandler), None)
        .expect("listener should bind");
    let (host_addr, host_port) = reactor.service_addr(service).unwrap();
    let (host_addr, host_port) = (host_addr.to_string(), host_port.to_string());
    let port: u16 = host_port.parse().unwrap();

    let _client = TcpStream::connect(("127.0.0.1", port)).expect("client should connect");

    let deadline = Instant::now() + Duration::from_secs(1);
    while reactor.connection_count() == 0 && Instant::now() < deadline {
        reactor.dispatch(Duration::from_millis(20)).expect("dispatch should not fail");
    }
    assert_eq!(reactor.connection_count(), 1);

    let (peer_addr, peer_port, got_host_addr, got_host_port) =
        reactor.get_addrs(0).expect("the one open connection should be addressable");
    assert_eq!(peer_addr, "127.0.0.1");
    assert!(peer_port.parse::<u16>().unwrap() > 0);
    assert_eq!(got_host_addr, host_addr);
    assert_eq!(got_host_port, host_port);
}
