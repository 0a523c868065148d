//! Shared test scaffolding: a reactor driven on a background thread until
//! told to stop, with a plain `std::thread::spawn` poll loop rather than an
//! async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use reactor_core::Reactor;

/// Drives a reactor on a background thread behind a `Mutex`, so a test can
/// both let it run and peek at its state (`connection_count`, `get_addrs`,
/// ...) between dispatch cycles without tearing the loop down first.
pub struct RunningReactor {
    stop: Arc<AtomicBool>,
    reactor: Arc<Mutex<Reactor>>,
    handle: Option<JoinHandle<()>>,
}

impl RunningReactor {
    pub fn spawn(reactor: Reactor) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let reactor = Arc::new(Mutex::new(reactor));
        let stop_clone = Arc::clone(&stop);
        let reactor_clone = Arc::clone(&reactor);
        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                reactor_clone
                    .lock()
                    .unwrap()
                    .dispatch(Duration::from_millis(20))
                    .expect("dispatch should not hit a fatal poll error in tests");
            }
        });
        Self { stop, reactor, handle: Some(handle) }
    }

    pub fn connection_count(&self) -> usize {
        self.reactor.lock().unwrap().connection_count()
    }

    /// Stops the background loop and hands the reactor back, so a test can
    /// assert on final state after shutdown.
    pub fn stop(mut self) -> Reactor {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.take().unwrap().join().expect("reactor thread panicked");
        Arc::try_unwrap(self.reactor).ok().expect("reactor still shared").into_inner().unwrap()
    }
}

pub fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}
