//! Non-blocking TCP setup, acceptance, and numeric address formatting.
//!
//! This is the only module that reaches the OS directly: raw
//! `libc::setsockopt` on a `mio` socket's raw fd, since `mio` does not expose
//! `SO_REUSEADDR` / `SO_REUSEPORT` / `SO_ERROR` plumbing. We drop to `libc`
//! for exactly those calls and let `mio` own everything else.

use std::{
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    os::fd::{AsRawFd, FromRawFd, RawFd},
};

use tracing::warn;

use crate::error::SocketSetupError;

/// Backlog passed to `listen()`.
const LISTEN_BACKLOG: i32 = 10;
/// Cap on a single `on_receive` read, per the three-callback contract.
pub const MAX_RECEIVE: usize = 65536;

/// Resolves `host:port` to a numeric address, opens a non-blocking listening
/// socket with address/port reuse, and returns it alongside the stringified
/// bound address.
pub fn resolve_and_bind(
    host: &str,
    port: u16,
) -> Result<(mio::net::TcpListener, String, String), SocketSetupError> {
    let lookup = format!("{host}:{port}");
    let addr = lookup
        .to_socket_addrs()
        .map_err(SocketSetupError::Option)?
        .next()
        .ok_or_else(|| SocketSetupError::Option(io::Error::other("resolve returned no addresses")))?;

    let family = if addr.is_ipv4() { libc::AF_INET } else { libc::AF_INET6 };
    // SAFETY: a plain socket(2) call; the fd is immediately wrapped and never
    // leaked on any error path below.
    let fd = unsafe { libc::socket(family, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(SocketSetupError::Socket(io::Error::last_os_error()));
    }

    if let Err(e) = set_reuse(fd) {
        unsafe { libc::close(fd) };
        return Err(SocketSetupError::Option(e));
    }
    if let Err(e) = set_nonblocking(fd) {
        unsafe { libc::close(fd) };
        return Err(SocketSetupError::Option(e));
    }
    if let Err(e) = bind_raw(fd, addr) {
        unsafe { libc::close(fd) };
        return Err(SocketSetupError::Bind(e));
    }
    // SAFETY: fd came from socket(2) above and is bound; listen(2) is safe to
    // call on it.
    if unsafe { libc::listen(fd, LISTEN_BACKLOG) } < 0 {
        let e = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(SocketSetupError::Listen(e));
    }

    // SAFETY: fd is a valid, open, bound-and-listening socket we exclusively own.
    let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
    let local = std_listener.local_addr().map_err(SocketSetupError::Bind)?;
    let listener = mio::net::TcpListener::from_std(std_listener);
    let (host_addr, host_port) = stringify_addr(local);
    Ok((listener, host_addr, host_port))
}

fn set_reuse(fd: RawFd) -> io::Result<()> {
    setsockopt_bool(fd, libc::SO_REUSEADDR, true)?;
    // SO_REUSEPORT isn't available on every platform mio targets; ignore
    // ENOPROTOOPT rather than fail registration over it.
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
    let _ = setsockopt_bool(fd, libc::SO_REUSEPORT, true);
    Ok(())
}

fn setsockopt_bool(fd: RawFd, name: libc::c_int, value: bool) -> io::Result<()> {
    let v: libc::c_int = i32::from(value);
    // SAFETY: fd is a valid socket; v lives for the duration of the call.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            name,
            std::ptr::from_ref(&v).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

/// Adds the non-blocking flag to a descriptor's mode.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fd is a valid, open descriptor for the lifetime of this call.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn bind_raw(fd: RawFd, addr: SocketAddr) -> io::Result<()> {
    let rc = match addr {
        SocketAddr::V4(a) => {
            let sa = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: a.port().to_be(),
                sin_addr: libc::in_addr { s_addr: u32::from_ne_bytes(a.ip().octets()) },
                sin_zero: [0; 8],
            };
            // SAFETY: sa is a valid sockaddr_in for the duration of the call.
            unsafe {
                libc::bind(
                    fd,
                    std::ptr::from_ref(&sa).cast::<libc::sockaddr>(),
                    std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                )
            }
        }
        SocketAddr::V6(a) => {
            let sa = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: a.port().to_be(),
                sin6_flowinfo: a.flowinfo(),
                sin6_addr: libc::in6_addr { s6_addr: a.ip().octets() },
                sin6_scope_id: a.scope_id(),
            };
            // SAFETY: sa is a valid sockaddr_in6 for the duration of the call.
            unsafe {
                libc::bind(
                    fd,
                    std::ptr::from_ref(&sa).cast::<libc::sockaddr>(),
                    std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                )
            }
        }
    };
    if rc < 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

/// Outcome of a single non-blocking accept attempt.
pub enum AcceptOutcome {
    Accepted { stream: mio::net::TcpStream, peer_addr: String, peer_port: String },
    WouldBlock,
    /// `EMFILE` / `ENFILE`: the descriptor table is exhausted. Not fatal.
    TableExhausted,
}

/// Accepts (at most) one connection from `listener`.
pub fn accept_one(listener: &mio::net::TcpListener) -> AcceptOutcome {
    match listener.accept() {
        Ok((stream, peer)) => {
            let (peer_addr, peer_port) = stringify_addr(peer);
            AcceptOutcome::Accepted { stream, peer_addr, peer_port }
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => AcceptOutcome::WouldBlock,
        Err(e) if matches!(e.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE)) => {
            warn!("accept: descriptor table exhausted ({e}); consider raising the fd ulimit");
            AcceptOutcome::TableExhausted
        }
        Err(e) => {
            warn!("accept: {e}");
            AcceptOutcome::WouldBlock
        }
    }
}

/// Retrieves a socket's pending error via `SO_ERROR`, if any.
pub fn pending_error(stream: &mio::net::TcpStream) -> io::Result<Option<i32>> {
    let fd = stream.as_raw_fd();
    let mut opt: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: fd is a valid socket; opt/len are sized for SO_ERROR's int payload.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            std::ptr::from_mut(&mut opt).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(if opt == 0 { None } else { Some(opt) })
}

/// Canonical `[addr]:port` rendering (split into its two halves): IPv6
/// addresses are bracketed, ports are decimal.
pub fn stringify_addr(addr: SocketAddr) -> (String, String) {
    let host = match addr.ip() {
        IpAddr::V4(a) => a.to_string(),
        IpAddr::V6(a) => format!("[{a}]"),
    };
    (host, addr.port().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringify_v4() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(stringify_addr(addr), ("127.0.0.1".to_string(), "9000".to_string()));
    }

    #[test]
    fn stringify_v6_is_bracketed() {
        let addr: SocketAddr = "[::1]:9000".parse().unwrap();
        assert_eq!(stringify_addr(addr), ("[::1]".to_string(), "9000".to_string()));
    }

    #[test]
    fn resolve_and_bind_ephemeral_port() {
        let (listener, host, port) = resolve_and_bind("127.0.0.1", 0).expect("bind should succeed");
        assert_eq!(host, "127.0.0.1");
        assert!(port.parse::<u16>().unwrap() > 0);
        drop(listener);
    }

    #[test]
    fn resolve_and_bind_rejects_unresolvable_host() {
        let err = resolve_and_bind("not-a-real-host.invalid", 0);
        assert!(err.is_err());
    }
}
