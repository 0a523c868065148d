//! 50 concurrent echo clients, each with a distinct payload; nothing
//! crosses between connections.

mod support;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use reactor_core::service::{ConnectionInfo, EventKind, UnifiedHandler};
use reactor_core::{ConnCtx, Reactor};
use support::RunningReactor;

struct EchoHandler;

impl UnifiedHandler for EchoHandler {
    fn handle(&mut self, _info: &ConnectionInfo<'_>, event: EventKind, data: &[u8], ctx: &mut ConnCtx<'_>) -> Result<(), ()> {
        if event == EventKind::READABLE {
            ctx.send(data).map_err(|_| ())?;
        }
        Ok(())
    }
}

#[test]
fn fifty_concurrent_clients_see_no_crosstalk() {
    const N: usize = 50;

    let mut reactor = Reactor::create().expect("reactor should start");
    let service = reactor.register_server("127.0.0.1", 0, Box::new(EchoHandler), None).expect("listener should bind");
    let port: u16 = reactor.service_addr(service).unwrap().1.parse().unwrap();

    let running = RunningReactor::spawn(reactor);

    let handles: Vec<_> = (0..N)
        .map(|i| {
            std::thread::spawn(move || {
                let mut client = TcpStream::connect(("127.0.0.1", port)).expect("client should connect");
                client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
                let payload = format!("client-{i:03}-payload").into_bytes();
                client.write_all(&payload).unwrap();

                let mut received = vec![0_u8; payload.len()];
                client.read_exact(&mut received).expect("echo should arrive");
                assert_eq!(received, payload, "client {i} received someone else's bytes");
            })
        })
        .collect();

    for h in handles {
        h.join().expect("client thread panicked");
    }

    running.stop();
}
