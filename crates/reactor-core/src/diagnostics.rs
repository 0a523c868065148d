//! The `[+]`/`[-]` textual convention from the original dispatcher's console
//! output, re-expressed as `tracing` events so it composes with whatever
//! subscriber the embedding binary installs instead of writing to stdout
//! directly.

use tracing::info;

pub fn listening(host: &str, port: &str) {
    info!(host, port, "[+] listening");
}

pub fn connected(peer_addr: &str, peer_port: &str) {
    info!(peer_addr, peer_port, "[+] connection accepted");
}

/// A clean peer close or a handler-requested close: a notable lifecycle
/// event, not a failure.
pub fn disconnected_gracefully(peer_addr: &str, peer_port: &str) {
    info!(peer_addr, peer_port, "[+] connection closed gracefully");
}

/// A socket error or a read failure forced the close.
pub fn disconnected_with_error(peer_addr: &str, peer_port: &str) {
    info!(peer_addr, peer_port, "[-] connection closed");
}
