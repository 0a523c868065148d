//! Demo driver: registers the `echo` and `line` services and runs the
//! dispatch loop until interrupted.
//!
//! Grounded on `original_source/src/main.c`: ignore `SIGPIPE` so a peer
//! closing mid-write doesn't kill the process, then loop on
//! `dispatcher_dispatch(d, 10)` until told to stop — here, a `ctrlc`-armed
//! flag takes the place of the original's unconditional `while (1)`.

mod echo_service;
mod line_service;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use reactor_core::{Reactor, TICKS_PER_SECOND};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use echo_service::EchoHandler;
use line_service::LineHandler;

#[derive(Parser)]
#[command(version, about = "Single-threaded event-driven TCP connection dispatcher")]
struct Args {
    /// Host to bind both demo services on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port for the echo service.
    #[arg(long, default_value_t = 7)]
    echo_port: u16,

    /// Port for the line-printer service.
    #[arg(long, default_value_t = 23)]
    line_port: u16,

    /// Seconds a connection may sit idle before it is closed.
    #[arg(long, default_value_t = 60)]
    inactivity_timeout_secs: u64,
}

fn ignore_sigpipe() {
    // SAFETY: installing a signal disposition at startup, before any other
    // thread exists, is the one place a raw libc call like this is sound
    // without additional synchronization.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    ignore_sigpipe();

    let mut reactor = match Reactor::create() {
        Ok(r) => r,
        Err(e) => {
            error!("failed to create reactor: {e}");
            return ExitCode::FAILURE;
        }
    };
    reactor.set_inactivity_timeout(args.inactivity_timeout_secs * TICKS_PER_SECOND);

    if let Err(e) = reactor.register_server(&args.host, args.echo_port, Box::new(EchoHandler), None) {
        error!("failed to register echo service on {}:{}: {e}", args.host, args.echo_port);
        return ExitCode::FAILURE;
    }
    if let Err(e) = reactor.add_listener(&args.host, args.line_port, Box::new(LineHandler::default()), None) {
        error!("failed to register line service on {}:{}: {e}", args.host, args.line_port);
        return ExitCode::FAILURE;
    }

    info!("dispatcher running, press Ctrl-C to stop");

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || running_clone.store(false, Ordering::Relaxed)) {
        error!("failed to install Ctrl-C handler: {e}");
        return ExitCode::FAILURE;
    }

    while running.load(Ordering::Relaxed) {
        if let Err(e) = reactor.dispatch(Duration::from_millis(10)) {
            error!("fatal poll failure, shutting down: {e}");
            return ExitCode::FAILURE;
        }
    }

    info!("shutting down, {} connections open", reactor.connection_count());
    ExitCode::SUCCESS
}
