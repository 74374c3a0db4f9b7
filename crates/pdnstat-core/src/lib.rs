//! pdnstat-core — shared library for the pdnstat collector.
//!
//! Provides:
//! - `collector` — PowerDNS control socket exchange, response parsing, transport abstraction
//! - `metric` — field sets, tags, measurement records and accumulator sinks
//! - `input` — the `Input` trait and the explicit `InputRegistry`
//! - `config` — collector configuration (`unix_sockets`)

pub mod collector;
pub mod config;
pub mod input;
pub mod metric;

use collector::{PowerdnsCollector, UnixConnector};
use input::{Input, InputRegistry, RegistryError};

/// Registers every input shipped with this crate.
///
/// Called by the hosting application's composition root; nothing is
/// registered implicitly.
pub fn register_inputs(registry: &mut InputRegistry) -> Result<(), RegistryError> {
    registry.register(PowerdnsCollector::<UnixConnector>::NAME, powerdns_input)
}

fn powerdns_input() -> Box<dyn Input> {
    Box::new(PowerdnsCollector::new(UnixConnector::new(), Vec::new()))
}
