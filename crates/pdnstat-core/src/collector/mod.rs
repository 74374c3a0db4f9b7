//! PowerDNS control socket collector.
//!
//! This module queries the control socket of one or more PowerDNS servers
//! with `show * ` and turns the comma separated `key=value` reply into a
//! [`FieldSet`](crate::metric::FieldSet), with support for mocking the
//! transport in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PowerdnsCollector                       │
//! │   unix_sockets (or /var/run/pdns.controlsocket)             │
//! │        │  one target at a time, fail-fast                   │
//! │  ┌─────▼───────────────┐   ┌─────────────────────────────┐  │
//! │  │  exchange           │   │  parser                     │  │
//! │  │  - connect          │──▶│  - split on ','             │  │
//! │  │  - write "show * \n"│   │  - split on first '='       │  │
//! │  │  - read until EOF   │   │  - i64 values               │  │
//! │  └─────┬───────────────┘   └─────────────────────────────┘  │
//! │        │                                                    │
//! │  ┌─────▼──────┐                                             │
//! │  │ Connector  │ (trait)                                     │
//! │  └─────┬──────┘                                             │
//! └────────┼────────────────────────────────────────────────────┘
//!          │
//!    ┌─────┴──────────────┐
//!    │                    │
//! ┌──▼────────────┐ ┌─────▼─────────┐
//! │ UnixConnector │ │ MockConnector │
//! │ (production)  │ │ (testing)     │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```ignore
//! use pdnstat_core::collector::{PowerdnsCollector, UnixConnector};
//! use pdnstat_core::metric::MemoryAccumulator;
//!
//! let collector = PowerdnsCollector::new(UnixConnector::new(), vec![]);
//! let mut acc = MemoryAccumulator::new();
//! collector.collect(&mut acc)?;
//! ```
//!
//! ## Testing (with MockConnector)
//!
//! ```
//! use pdnstat_core::collector::{MockConnector, PowerdnsCollector};
//! use pdnstat_core::metric::MemoryAccumulator;
//!
//! let connector = MockConnector::authoritative_server();
//! let collector = PowerdnsCollector::new(connector, vec![]);
//! let mut acc = MemoryAccumulator::new();
//! collector.collect(&mut acc).unwrap();
//! assert_eq!(acc.len(), 1);
//! ```

mod error;
pub mod exchange;
pub mod mock;
pub mod parser;
mod powerdns;
pub mod traits;

pub use error::CollectError;
pub use exchange::{ExchangeLimits, query_stats};
pub use mock::{MockConnector, MockReply};
pub use parser::{ParseError, parse_response};
pub use powerdns::{DEFAULT_SOCKET, FailurePolicy, MEASUREMENT, PowerdnsCollector, SERVER_TAG};
pub use traits::{Connector, ControlStream, UnixConnector};
