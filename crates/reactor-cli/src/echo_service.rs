//! Unified-event echo service, grounded on `builtin-echo.c`: allocate
//! per-connection state on `CREATED`, echo bytes back on `READABLE`, and let
//! the connection's user-data slot be dropped for us on `CLOSED` instead of
//! the original's explicit `free()`.
//!
//! `ctx.send` may write fewer bytes than handed to it; `EchoState.pending`
//! buffers whatever's left and `drain` resumes it across `WRITABLE` events,
//! the same loop `tests/partial_write.rs`'s `StreamingSender` uses by hand.

use reactor_core::service::{ConnectionInfo, EventKind, UnifiedHandler, WantInterest};
use reactor_core::ConnCtx;
use tracing::info;

struct EchoState {
    bytes_echoed: u64,
    pending: Vec<u8>,
}

pub struct EchoHandler;

impl UnifiedHandler for EchoHandler {
    fn handle(
        &mut self,
        info: &ConnectionInfo<'_>,
        event: EventKind,
        data: &[u8],
        ctx: &mut ConnCtx<'_>,
    ) -> Result<(), ()> {
        match event {
            EventKind::CREATED => {
                ctx.set_userdata(Box::new(EchoState { bytes_echoed: 0, pending: Vec::new() }));
            }
            EventKind::READABLE => {
                let Some(mut state) = ctx.take_userdata::<EchoState>() else { return Ok(()) };
                state.pending.extend_from_slice(data);
                let result = drain(&mut state, ctx);
                ctx.set_userdata(Box::new(state));
                result?;
            }
            EventKind::WRITABLE => {
                let Some(mut state) = ctx.take_userdata::<EchoState>() else { return Ok(()) };
                let result = drain(&mut state, ctx);
                ctx.set_userdata(Box::new(state));
                result?;
            }
            EventKind::CLOSED => {
                let total = ctx
                    .userdata()
                    .and_then(|d| d.downcast_ref::<EchoState>())
                    .map_or(0, |s| s.bytes_echoed);
                info!(peer = info.peer_addr, total, "echo connection closed");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Sends as much of `state.pending` as the socket currently accepts. A
/// partial write re-arms `WRITABLE` (done inside `ctx.send` itself) and
/// returns, leaving the remainder for the next `WRITABLE` event; a full
/// drain re-arms `READABLE` so the connection goes back to waiting for more
/// input.
fn drain(state: &mut EchoState, ctx: &mut ConnCtx<'_>) -> Result<(), ()> {
    while !state.pending.is_empty() {
        let n = ctx.send(&state.pending).map_err(|_| ())?;
        if n == 0 {
            return Ok(());
        }
        state.pending.drain(..n);
        state.bytes_echoed += n as u64;
    }
    ctx.rearm(WantInterest::Readable).map_err(|_| ())
}
