//! Error taxonomy.
//!
//! Only failures that are surfaced synchronously to a caller get a typed
//! error here. Transient socket errors (`EAGAIN`, `EINTR`, `EMFILE` on
//! accept) are logged and absorbed inside the reactor loop; connection-level
//! failures become `ERRORED`/`CLOSED` events, not `Result`s.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to resolve {0}")]
    Resolve(String, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SocketSetupError {
    #[error("socket() failed: {0}")]
    Socket(#[source] std::io::Error),
    #[error("setsockopt() failed: {0}")]
    Option(#[source] std::io::Error),
    #[error("bind() failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("listen() failed: {0}")]
    Listen(#[source] std::io::Error),
}

/// Raised synchronously when [`crate::reactor::Reactor::add_listener`] or
/// [`crate::reactor::Reactor::register_server`] fails. No reactor state
/// changes when this is returned.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    SocketSetup(#[from] SocketSetupError),
}

/// The readiness primitive itself failed in a non-benign way. Once this is
/// returned from `dispatch`, the reactor must be torn down.
#[derive(Debug, Error)]
pub enum FatalPollError {
    #[error("poll() failed after {attempts} retries: {source}")]
    Poll { attempts: u32, #[source] source: std::io::Error },
}
