//! Request/response exchange with a control socket.
//!
//! One exchange is: connect, write `show * \n`, flush, then read until the
//! server closes the stream. A single absolute deadline covers all of it.

use std::io;
use std::time::{Duration, Instant};

use tracing::trace;

use super::error::CollectError;
use super::traits::{Connector, ControlStream};

/// Command asking the server for every statistic.
pub const COMMAND: &[u8] = b"show * \n";

/// Deadline for connect, write and read combined.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest accepted reply.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Initial capacity of the reply buffer.
const INITIAL_BUFFER: usize = 4096;

/// Size of a single read.
const READ_CHUNK: usize = 1024;

/// Bounds applied to one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeLimits {
    pub timeout: Duration,
    pub max_response_bytes: usize,
}

impl Default for ExchangeLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }
}

/// Absolute point in time after which the exchange is abandoned.
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn start(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    /// Time left, or `Timeout` once the deadline has passed.
    fn remaining(&self, address: &str) -> Result<Duration, CollectError> {
        match self.at.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(self.expired(address)),
        }
    }

    fn expired(&self, address: &str) -> CollectError {
        CollectError::Timeout {
            address: address.to_string(),
            timeout: self.timeout,
        }
    }
}

/// Sends `show * ` to `address` and returns the raw reply.
///
/// The connection is owned by this call and closed before it returns, on
/// success and on every error path.
pub fn query_stats<C: Connector>(
    connector: &C,
    address: &str,
    limits: &ExchangeLimits,
) -> Result<Vec<u8>, CollectError> {
    let deadline = Deadline::start(limits.timeout);

    trace!(address, "connecting");
    let budget = deadline.remaining(address)?;
    let mut stream = connector
        .connect(address, budget)
        .map_err(|e| connect_error(address, &deadline, e))?;

    trace!(address, "sending command");
    send_command(&mut stream, address, &deadline)?;

    trace!(address, "receiving response");
    let raw = read_to_end(&mut stream, address, &deadline, limits.max_response_bytes)?;
    trace!(address, bytes = raw.len(), "response complete");

    Ok(raw)
}

fn send_command<S: ControlStream>(
    stream: &mut S,
    address: &str,
    deadline: &Deadline,
) -> Result<(), CollectError> {
    let budget = deadline.remaining(address)?;
    stream
        .set_write_timeout(Some(budget))
        .map_err(|e| transport_error(address, e))?;
    stream
        .write_all(COMMAND)
        .map_err(|e| io_error(address, deadline, e))?;
    stream.flush().map_err(|e| io_error(address, deadline, e))
}

fn read_to_end<S: ControlStream>(
    stream: &mut S,
    address: &str,
    deadline: &Deadline,
    limit: usize,
) -> Result<Vec<u8>, CollectError> {
    let mut buf = Vec::with_capacity(INITIAL_BUFFER.min(limit));
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let budget = deadline.remaining(address)?;
        stream
            .set_read_timeout(Some(budget))
            .map_err(|e| transport_error(address, e))?;

        match stream.read(&mut chunk) {
            Ok(0) => return Ok(buf),
            Ok(n) => {
                if buf.len() + n > limit {
                    return Err(CollectError::ResponseTooLarge {
                        address: address.to_string(),
                        limit,
                    });
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_error(address, deadline, e)),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn connect_error(address: &str, deadline: &Deadline, e: io::Error) -> CollectError {
    if is_timeout(&e) {
        deadline.expired(address)
    } else {
        CollectError::Connection {
            address: address.to_string(),
            source: e,
        }
    }
}

/// Maps an I/O error from the write or read phase.
/// Socket timeouts surface as `WouldBlock` or `TimedOut` depending on the platform.
fn io_error(address: &str, deadline: &Deadline, e: io::Error) -> CollectError {
    if is_timeout(&e) {
        deadline.expired(address)
    } else {
        transport_error(address, e)
    }
}

fn transport_error(address: &str, e: io::Error) -> CollectError {
    CollectError::Transport {
        address: address.to_string(),
        source: e,
    }
}
