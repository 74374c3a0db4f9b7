//! In-memory mock connector for testing collectors without a PowerDNS server.
//!
//! `MockConnector` maps socket addresses to scripted replies and records what
//! the collector did: which addresses it connected to and what it wrote.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::collector::traits::{Connector, ControlStream};

/// Scripted behaviour of one mock address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Accept, read the command, answer with these bytes and close.
    Response(Vec<u8>),
    /// Refuse the connection.
    Refused,
    /// Let the connection attempt time out.
    ConnectTimeout,
    /// Accept, but fail every write.
    WriteFails,
    /// Accept, then reset the connection on read.
    ReadFails,
    /// Accept and never answer; reads time out.
    Silent,
}

#[derive(Debug, Default)]
struct MockLog {
    connections: Vec<String>,
    written: HashMap<String, Vec<u8>>,
}

/// Connector that serves scripted replies from memory.
#[derive(Debug, Clone)]
pub struct MockConnector {
    replies: HashMap<String, MockReply>,
    chunk_size: usize,
    log: Arc<Mutex<MockLog>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self {
            replies: HashMap::new(),
            chunk_size: 1024,
            log: Arc::default(),
        }
    }
}

impl MockConnector {
    /// Creates a connector that knows no addresses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits how many bytes a single read returns.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Scripts `address` to answer with `body`.
    pub fn add_response(&mut self, address: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.add_reply(address, MockReply::Response(body.into()));
    }

    /// Scripts arbitrary behaviour for `address`.
    pub fn add_reply(&mut self, address: impl Into<String>, reply: MockReply) {
        self.replies.insert(address.into(), reply);
    }

    /// Addresses connected to so far, in order, including failed attempts.
    pub fn connections(&self) -> Vec<String> {
        self.log().connections.clone()
    }

    /// Bytes written to `address` over all connections.
    pub fn written(&self, address: &str) -> Vec<u8> {
        self.log().written.get(address).cloned().unwrap_or_default()
    }

    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MockConnector {
    type Stream = MockStream;

    fn connect(&self, address: &str, _timeout: Duration) -> io::Result<MockStream> {
        self.log().connections.push(address.to_string());

        let reply = match self.replies.get(address) {
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mock socket at {address}"),
                ));
            }
            Some(MockReply::Refused) => {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            Some(MockReply::ConnectTimeout) => {
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            Some(reply) => reply.clone(),
        };

        Ok(MockStream {
            address: address.to_string(),
            reply,
            position: 0,
            chunk_size: self.chunk_size,
            log: Arc::clone(&self.log),
        })
    }
}

/// Stream handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockStream {
    address: String,
    reply: MockReply,
    position: usize,
    chunk_size: usize,
    log: Arc<Mutex<MockLog>>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.reply {
            MockReply::Response(body) => {
                let remaining = &body[self.position..];
                let n = remaining.len().min(buf.len()).min(self.chunk_size);
                buf[..n].copy_from_slice(&remaining[..n]);
                self.position += n;
                Ok(n)
            }
            MockReply::Silent => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            MockReply::ReadFails => Err(io::Error::from(io::ErrorKind::ConnectionReset)),
            _ => Ok(0),
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.reply == MockReply::WriteFails {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.written
            .entry(self.address.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ControlStream for MockStream {
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}
