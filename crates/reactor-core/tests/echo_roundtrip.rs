//! Bytes a client sends come back byte-for-byte, in order.

mod support;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use reactor_core::service::{ConnectionInfo, EventKind, UnifiedHandler};
use reactor_core::{ConnCtx, Reactor};
use support::RunningReactor;

struct EchoHandler;

impl UnifiedHandler for EchoHandler {
    fn handle(
        &mut self,
        _info: &ConnectionInfo<'_>,
        event: EventKind,
        data: &[u8],
        ctx: &mut ConnCtx<'_>,
    ) -> Result<(), ()> {
        if event == EventKind::READABLE {
            ctx.send(data).map_err(|_| ())?;
        }
        Ok(())
    }
}

#[test]
fn echo_roundtrip_byte_for_byte() {
    let mut reactor = Reactor::create().expect("reactor should start");
    let service = reactor
        .register_server("127.0.0.1", 0, Box::new(EchoHandler), None)
        .expect("listener should bind");
    let port: u16 = reactor.service_addr(service).unwrap().1.parse().unwrap();

    let running = RunningReactor::spawn(reactor);

    let mut client = TcpStream::connect(("127.0.0.1", port)).expect("client should connect");
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let payload = b"the quick brown fox jumps over the lazy dog";
    client.write_all(payload).unwrap();

    let mut received = vec![0_u8; payload.len()];
    client.read_exact(&mut received).expect("echo should arrive");
    assert_eq!(&received, payload);

    drop(client);
    running.stop();
}
