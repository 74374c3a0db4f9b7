//! Collector configuration.
//!
//! The only option is `unix_sockets`, the ordered list of control socket
//! paths to query. An empty list means "use the default socket".
//!
//! Configuration files are JSON documents. Lines whose first non-blank
//! character is `#` are comments and are ignored.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid input configuration: {0}")]
    Invalid(#[source] serde_json::Error),
}

/// Configuration of the PowerDNS input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerdnsConfig {
    /// Control socket paths, queried in order.
    #[serde(default)]
    pub unix_sockets: Vec<String>,
}

impl PowerdnsConfig {
    pub fn new(unix_sockets: Vec<String>) -> Self {
        Self { unix_sockets }
    }

    /// Parses a JSON document such as `{"unix_sockets": ["/var/run/pdns.controlsocket"]}`.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let stripped: String = content
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .map(|line| format!("{line}\n"))
            .collect();
        serde_json::from_str(&stripped)
    }

    /// Reads the configuration out of an already parsed document.
    pub fn from_value(document: &Value) -> Result<Self, ConfigError> {
        Self::deserialize(document).map_err(ConfigError::Invalid)
    }

    /// Renders the configuration as a JSON document.
    pub fn to_value(&self) -> Value {
        json!({ "unix_sockets": self.unix_sockets })
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Json {
            path: display,
            source,
        })
    }

    /// Appends extra sockets after the configured ones.
    pub fn extend_sockets<I>(&mut self, sockets: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.unix_sockets.extend(sockets);
    }
}
