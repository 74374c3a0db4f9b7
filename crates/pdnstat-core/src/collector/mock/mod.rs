//! Mock connector implementations for testing.
//!
//! This module provides `MockConnector` and pre-built scenarios for testing
//! collectors without a running PowerDNS server.

mod connector;
mod scenarios;

pub use connector::{MockConnector, MockReply, MockStream};
pub use scenarios::{AUTHORITATIVE_REPLY, MINIMAL_REPLY};
