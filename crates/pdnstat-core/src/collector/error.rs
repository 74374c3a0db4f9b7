use std::io;
use std::time::Duration;

use thiserror::Error;

use super::parser::ParseError;

/// Error raised while collecting from a control socket.
///
/// Every variant carries the target address. Any of them aborts the whole
/// gather pass.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out talking to {address} after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("I/O error on {address}: {source}")]
    Transport {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("response from {address} exceeds {limit} bytes")]
    ResponseTooLarge { address: String, limit: usize },

    #[error("malformed response from {address}: {source}")]
    Parse {
        address: String,
        #[source]
        source: ParseError,
    },
}

impl CollectError {
    /// Address of the target that failed.
    pub fn address(&self) -> &str {
        match self {
            CollectError::Connection { address, .. }
            | CollectError::Timeout { address, .. }
            | CollectError::Transport { address, .. }
            | CollectError::ResponseTooLarge { address, .. }
            | CollectError::Parse { address, .. } => address,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CollectError::Timeout { .. })
    }
}
