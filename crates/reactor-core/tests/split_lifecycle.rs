//! A three-callback handler's `on_event` sees `NewConnection` and
//! `TimeoutInactivity` as distinct values — never collapsed into one
//! generic timeout the way the unified style's bit-flagged `EventKind`
//! necessarily is — and can request a close on its own via `ConnCtx::close`,
//! since `on_event` returns `()` and has no `Err` to signal through.

mod support;

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reactor_core::service::{ConnectionHandlers, ConnectionInfo, LifecycleEvent};
use reactor_core::{ConnCtx, Reactor};
use support::{wait_until, RunningReactor};

struct LifecycleWatcher {
    saw_new_connection: Arc<AtomicBool>,
    saw_timeout_inactivity: Arc<AtomicBool>,
}

impl ConnectionHandlers for LifecycleWatcher {
    fn on_receive(&mut self, _info: &ConnectionInfo<'_>, _data: &[u8], _ctx: &mut ConnCtx<'_>) -> Result<(), ()> {
        Ok(())
    }

    fn on_writable(&mut self, _info: &ConnectionInfo<'_>, _ctx: &mut ConnCtx<'_>) -> Result<bool, ()> {
        Ok(false)
    }

    fn on_event(&mut self, _info: &ConnectionInfo<'_>, event: LifecycleEvent, ctx: &mut ConnCtx<'_>) {
        match event {
            LifecycleEvent::NewConnection => self.saw_new_connection.store(true, Ordering::Relaxed),
            LifecycleEvent::TimeoutInactivity => {
                self.saw_timeout_inactivity.store(true, Ordering::Relaxed);
                ctx.close();
            }
            _ => {}
        }
    }
}

#[test]
fn split_handler_sees_distinct_lifecycle_events_and_can_close_from_on_event() {
    let saw_new_connection = Arc::new(AtomicBool::new(false));
    let saw_timeout_inactivity = Arc::new(AtomicBool::new(false));
    let mut reactor = Reactor::create().expect("reactor should start");
    reactor.set_inactivity_timeout(4 * reactor_core::TICKS_PER_SECOND / 10); // 400ms
    let service = reactor
        .add_listener(
            "127.0.0.1",
            0,
            Box::new(LifecycleWatcher {
                saw_new_connection: Arc::clone(&saw_new_connection),
                saw_timeout_inactivity: Arc::clone(&saw_timeout_inactivity),
            }),
            None,
        )
        .expect("listener should bind");
    let port: u16 = reactor.service_addr(service).unwrap().1.parse().unwrap();

    let running = RunningReactor::spawn(reactor);
    let baseline = running.connection_count();

    let client = TcpStream::connect(("127.0.0.1", port)).expect("client should connect");
    assert!(wait_until(|| saw_new_connection.load(Ordering::Relaxed), Duration::from_secs(1)));
    assert!(
        wait_until(|| saw_timeout_inactivity.load(Ordering::Relaxed), Duration::from_secs(2)),
        "TimeoutInactivity must reach on_event as its own value, not a generic timeout"
    );
    assert!(
        wait_until(|| running.connection_count() == baseline, Duration::from_secs(1)),
        "ctx.close() called from on_event should tear the connection down"
    );

    drop(client);
    running.stop();
}
