//! TCP connection establishment
// (c) 2025 Ross Younger
//!
//! Connecting to a whois server is a multi-candidate affair: a name may
//! resolve to several addresses across address families, and we try each in
//! turn with a bounded wait rather than hanging on the first unreachable
//! one.

use std::net::{SocketAddr, TcpStream};
use std::os::fd::AsFd;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use dns_lookup::{getaddrinfo, AddrInfoHints, SockType};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

static_assertions::assert_cfg!(unix, "This OS is not yet supported");

/// The service we ask the resolver for when no port is given
pub const DEFAULT_SERVICE: &str = "whois";

/// Establishes a TCP connection to `host`.
///
/// `port` 0 means the well-known `whois` service. Every address the host
/// resolves to is tried in resolver order; `timeout` applies to each
/// candidate separately, so the worst case is `timeout` times the number of
/// candidates. The returned stream is in blocking mode.
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let candidates = resolve(host, port)?;
    connect_candidates(host, &candidates, timeout)
}

/// Resolves `host` to its stream-socket candidate addresses, any family
fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let service = if port == 0 {
        DEFAULT_SERVICE.to_string()
    } else {
        port.to_string()
    };
    let hints = AddrInfoHints {
        socktype: SockType::Stream.into(),
        ..AddrInfoHints::default()
    };
    let addrs = getaddrinfo(Some(host), Some(&service), Some(hints))
        .map_err(std::io::Error::from)
        .with_context(|| format!("resolving {host}"))?;
    let candidates: Vec<_> = addrs.filter_map(|r| r.ok().map(|ai| ai.sockaddr)).collect();
    anyhow::ensure!(!candidates.is_empty(), "{host}: no usable addresses");
    Ok(candidates)
}

// Takes the candidate list separately so tests can exercise the fallback
// logic without a resolver.
fn connect_candidates(
    host: &str,
    candidates: &[SocketAddr],
    timeout: Duration,
) -> Result<TcpStream> {
    let mut remaining = candidates.len();
    for addr in candidates {
        remaining -= 1;
        let socket = match Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))
        {
            Ok(s) => s,
            // A kernel without IPv6 support is not fatal while other
            // candidates remain.
            Err(e) if addr.is_ipv6() && remaining > 0 => {
                debug!("skipping {addr}: {e}");
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("creating socket for {addr}")),
        };
        socket
            .set_nonblocking(true)
            .context("setting socket non-blocking")?;
        match attempt(&socket, *addr, timeout) {
            Ok(()) => {
                socket
                    .set_nonblocking(false)
                    .context("restoring socket to blocking mode")?;
                debug!("connected to {addr}");
                return Ok(socket.into());
            }
            // candidate failed; the socket drops closed and we move on
            Err(e) => debug!("connection to {addr} failed: {e}"),
        }
    }
    Err(anyhow!("could not connect to {host}: all addresses failed"))
}

// One candidate: non-blocking connect, then wait for writability within the
// timeout and check SO_ERROR.
fn attempt(socket: &Socket, addr: SocketAddr, timeout: Duration) -> std::io::Result<()> {
    match socket.connect(&SockAddr::from(addr)) {
        Ok(()) => return Ok(()), // connected immediately (loopback does this)
        Err(e) if e.raw_os_error() == Some(Errno::EINPROGRESS as i32) => (),
        Err(e) => return Err(e),
    }
    let mut fds = [PollFd::new(socket.as_fd(), PollFlags::POLLOUT)];
    let n = poll(
        &mut fds,
        PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX),
    )?;
    if n == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no response within {}s", timeout.as_secs()),
        ));
    }
    match socket.take_error()? {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

///////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use std::net::{SocketAddr, TcpListener};
    use std::time::Duration;

    use assertables::assert_contains;

    use super::{connect, connect_candidates, resolve};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn local_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    // a port nobody is listening on, found by binding and dropping
    fn dead_port() -> SocketAddr {
        let (listener, addr) = local_listener();
        drop(listener);
        addr
    }

    #[test]
    fn direct_connection() {
        let (_listener, addr) = local_listener();
        let stream = connect_candidates("test", &[addr], TIMEOUT).unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }

    #[test]
    fn fallback_to_second_candidate() {
        let dead = dead_port();
        let (_listener, live) = local_listener();
        let stream = connect_candidates("test", &[dead, live], TIMEOUT).unwrap();
        assert_eq!(stream.peer_addr().unwrap(), live);
    }

    #[test]
    fn timed_out_candidate_falls_through() {
        // unroutable first candidate, live second; the first must not absorb
        // more than its own timeout
        let unreachable: SocketAddr = "192.0.2.1:43".parse().unwrap();
        let (_listener, live) = local_listener();
        let stream =
            connect_candidates("test", &[unreachable, live], Duration::from_millis(300)).unwrap();
        assert_eq!(stream.peer_addr().unwrap(), live);
    }

    #[test]
    fn all_candidates_failing_is_an_error() {
        let err = connect_candidates("test", &[dead_port()], TIMEOUT).unwrap_err();
        assert_contains!(err.to_string(), "all addresses failed");
    }

    #[test]
    fn empty_candidate_list_is_an_error() {
        assert!(connect_candidates("test", &[], TIMEOUT).is_err());
    }

    #[test]
    fn unreachable_candidate_does_not_hang() {
        // TEST-NET-1 (RFC 5737) is never routed; we expect either a quick
        // network error or our own timeout, never a hang
        let addr: SocketAddr = "192.0.2.1:43".parse().unwrap();
        let err = connect_candidates("test", &[addr], Duration::from_millis(300)).unwrap_err();
        assert_contains!(err.to_string(), "all addresses failed");
    }

    #[test]
    fn literal_addresses_resolve_without_dns() {
        let candidates = resolve("127.0.0.1", 4343).unwrap();
        assert_eq!(
            candidates,
            vec!["127.0.0.1:4343".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn named_service_resolution() {
        // "whois" is in /etc/services approximately everywhere; an
        // environment without one correctly reports failure instead
        match resolve("127.0.0.1", 0) {
            Ok(candidates) => assert_eq!(
                candidates,
                vec!["127.0.0.1:43".parse::<SocketAddr>().unwrap()]
            ),
            Err(e) => assert_contains!(e.to_string(), "resolving"),
        }
    }

    #[test]
    fn unresolvable_host_fails_before_any_socket() {
        // the empty string never resolves
        let err = connect("", 43, TIMEOUT).unwrap_err();
        assert_contains!(err.to_string(), "resolving");
    }
}
