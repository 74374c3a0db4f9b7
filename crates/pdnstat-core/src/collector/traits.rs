//! Abstractions for control socket access to enable testing and mocking.
//!
//! The `Connector` trait allows the collector to talk to a real PowerDNS
//! control socket or to an in-memory mock in tests.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use socket2::{Domain, SockAddr, Socket, Type};

/// A connected, bidirectional control socket stream.
///
/// Timeouts are re-applied before every blocking call so that a single
/// deadline can span the whole exchange.
pub trait ControlStream: Read + Write {
    /// Sets the timeout for subsequent reads. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Sets the timeout for subsequent writes. `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

/// Opens control socket connections.
pub trait Connector {
    type Stream: ControlStream;

    /// Connects to `address`, giving up after `timeout`.
    ///
    /// # Arguments
    /// * `address` - Path of the local-domain socket
    /// * `timeout` - Upper bound for the connection attempt (must be non-zero)
    ///
    /// # Returns
    /// The connected stream, or an I/O error. An elapsed timeout is reported
    /// with `ErrorKind::TimedOut`.
    fn connect(&self, address: &str, timeout: Duration) -> io::Result<Self::Stream>;
}

impl ControlStream for UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UnixStream::set_write_timeout(self, timeout)
    }
}

/// Real connector for Unix domain stream sockets.
///
/// `std` has no bounded connect for Unix sockets, so the socket is built and
/// connected with `socket2` and then handed over to a `UnixStream`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixConnector;

impl UnixConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for UnixConnector {
    type Stream = UnixStream;

    fn connect(&self, address: &str, timeout: Duration) -> io::Result<UnixStream> {
        let addr = SockAddr::unix(address)?;
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
        socket.connect_timeout(&addr, timeout)?;
        Ok(UnixStream::from(socket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn test_unix_connector_connects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdns.controlsocket");
        let _listener = UnixListener::bind(&path).unwrap();

        let connector = UnixConnector::new();
        let stream = connector
            .connect(path.to_str().unwrap(), Duration::from_secs(1))
            .unwrap();
        ControlStream::set_read_timeout(&stream, Some(Duration::from_millis(10))).unwrap();
    }

    #[test]
    fn test_unix_connector_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");

        let err = UnixConnector::new()
            .connect(path.to_str().unwrap(), Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
