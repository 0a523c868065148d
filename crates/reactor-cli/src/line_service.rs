//! Three-callback, telnet-style line printer. Not present in
//! `original_source` (which only alludes to a line-printer example), built
//! fresh to exercise `on_receive`/`on_writable`/`on_event` end-to-end,
//! including the `TIMEOUT_INACTIVITY` → connection-close path.

use std::collections::HashMap;

use reactor_core::service::{ConnectionHandlers, ConnectionInfo, LifecycleEvent};
use reactor_core::ConnCtx;
use tracing::info;

/// Buffers partial lines per connection slot. Keyed by slot rather than
/// routed through the reactor's user-data slot because the buffer here is
/// purely this handler's bookkeeping, never read back by anything else.
#[derive(Default)]
pub struct LineHandler {
    partial: HashMap<usize, Vec<u8>>,
}

impl ConnectionHandlers for LineHandler {
    fn on_receive(&mut self, info: &ConnectionInfo<'_>, data: &[u8], ctx: &mut ConnCtx<'_>) -> Result<(), ()> {
        let buf = self.partial.entry(info.slot).or_default();
        buf.extend_from_slice(data);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            info!(peer = info.peer_addr, line = text, "line received");
            ctx.send(format!("you said: {text}\n").as_bytes()).map_err(|_| ())?;
        }
        Ok(())
    }

    fn on_writable(&mut self, _info: &ConnectionInfo<'_>, _ctx: &mut ConnCtx<'_>) -> Result<bool, ()> {
        Ok(false)
    }

    fn on_event(&mut self, info: &ConnectionInfo<'_>, event: LifecycleEvent, _ctx: &mut ConnCtx<'_>) {
        match event {
            LifecycleEvent::EndConnection => {
                self.partial.remove(&info.slot);
            }
            LifecycleEvent::TimeoutInactivity => {
                info!(peer = info.peer_addr, "line connection idle, closing");
            }
            _ => {}
        }
    }
}
