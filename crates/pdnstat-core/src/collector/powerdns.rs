//! PowerDNS statistics collector.
//!
//! Queries every configured control socket in order and pushes one
//! `powerdns` measurement per server, tagged with `server=<socket path>`.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::error::CollectError;
use super::exchange::{ExchangeLimits, query_stats};
use super::parser::parse_bytes;
use super::traits::Connector;
use crate::config::{ConfigError, PowerdnsConfig};
use crate::input::Input;
use crate::metric::{Accumulator, FieldSet, Tags};

/// Control socket queried when no sockets are configured.
pub const DEFAULT_SOCKET: &str = "/var/run/pdns.controlsocket";

/// Measurement name of every emitted record.
pub const MEASUREMENT: &str = "powerdns";

/// Tag holding the socket path a record came from.
pub const SERVER_TAG: &str = "server";

const DESCRIPTION: &str = "Read metrics from one or many PowerDNS servers";

const SAMPLE_CONFIG: &str = r#"# An array of control sockets to gather stats about.
# Specify a path to a unix socket.
#
# If no sockets are specified, then '/var/run/pdns.controlsocket' is used as the path.
{
  "unix_sockets": ["/var/run/pdns.controlsocket"]
}
"#;

/// What a gather pass does when one target fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing target and return its error.
    ///
    /// Records already pushed for earlier targets stay in the accumulator;
    /// later targets are not contacted.
    #[default]
    FailFast,
}

/// Collects statistics from PowerDNS control sockets.
pub struct PowerdnsCollector<C: Connector> {
    connector: C,
    unix_sockets: Vec<String>,
    limits: ExchangeLimits,
    policy: FailurePolicy,
}

impl<C: Connector> PowerdnsCollector<C> {
    /// Registry name of this input.
    pub const NAME: &'static str = "powerdns";

    /// Creates a collector for `unix_sockets`. An empty list selects [`DEFAULT_SOCKET`].
    pub fn new(connector: C, unix_sockets: Vec<String>) -> Self {
        Self {
            connector,
            unix_sockets,
            limits: ExchangeLimits::default(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn from_config(connector: C, config: &PowerdnsConfig) -> Self {
        Self::new(connector, config.unix_sockets.clone())
    }

    /// Overrides the per-target deadline (default 5 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Overrides the reply size limit (default 1 MiB).
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.limits.max_response_bytes = limit;
        self
    }

    pub fn limits(&self) -> &ExchangeLimits {
        &self.limits
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Sockets a gather pass will query, in order.
    pub fn targets(&self) -> Vec<&str> {
        if self.unix_sockets.is_empty() {
            vec![DEFAULT_SOCKET]
        } else {
            self.unix_sockets.iter().map(String::as_str).collect()
        }
    }

    /// Queries one control socket and parses its reply.
    pub fn gather_server(&self, address: &str) -> Result<FieldSet, CollectError> {
        let raw = query_stats(&self.connector, address, &self.limits)?;
        parse_bytes(&raw).map_err(|source| CollectError::Parse {
            address: address.to_string(),
            source,
        })
    }

    /// Runs one gather pass over all targets.
    ///
    /// Targets are processed sequentially. With [`FailurePolicy::FailFast`]
    /// the first error ends the pass and is returned unchanged.
    pub fn collect(&self, acc: &mut dyn Accumulator) -> Result<(), CollectError> {
        let targets = self.targets();
        let started = Instant::now();

        for (done, address) in targets.iter().enumerate() {
            let fields = match self.gather_server(address) {
                Ok(fields) => fields,
                Err(e) => match self.policy {
                    FailurePolicy::FailFast => {
                        warn!(
                            address,
                            succeeded = done,
                            total = targets.len(),
                            "aborting gather pass: {}",
                            e
                        );
                        return Err(e);
                    }
                },
            };

            debug!(address, fields = fields.len(), "collected");
            let tags = Tags::from([(SERVER_TAG.to_string(), address.to_string())]);
            acc.add_fields(MEASUREMENT, fields, tags);
        }

        debug!(
            targets = targets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gather pass complete"
        );
        Ok(())
    }
}

impl<C: Connector> Input for PowerdnsCollector<C> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn sample_config(&self) -> &'static str {
        SAMPLE_CONFIG
    }

    fn configure(&mut self, document: &Value) -> Result<(), ConfigError> {
        let config = PowerdnsConfig::from_value(document)?;
        self.unix_sockets = config.unix_sockets;
        Ok(())
    }

    fn gather(&mut self, acc: &mut dyn Accumulator) -> Result<(), CollectError> {
        self.collect(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MINIMAL_REPLY, MockConnector, MockReply};
    use crate::collector::parser::ParseError;
    use crate::collector::traits::UnixConnector;
    use crate::metric::MemoryAccumulator;
    use std::io::{self, Read, Write};
    use std::os::unix::net::UnixListener;
    use std::path::Path;
    use std::thread;

    #[test]
    fn test_collect_default_socket() {
        let collector = PowerdnsCollector::new(MockConnector::authoritative_server(), vec![]);
        let mut acc = MemoryAccumulator::new();

        collector.collect(&mut acc).unwrap();

        assert_eq!(acc.len(), 1);
        let rec = &acc.records()[0];
        assert_eq!(rec.measurement, "powerdns");
        assert_eq!(rec.tag("server"), Some(DEFAULT_SOCKET));
        assert_eq!(rec.tags.len(), 1);
        assert_eq!(rec.fields.len(), 38);
        assert_eq!(rec.fields["uptime"], 86317);
        assert_eq!(collector.connector().connections(), vec![DEFAULT_SOCKET]);
    }

    #[test]
    fn test_empty_targets_same_as_default() {
        let implicit = PowerdnsCollector::new(MockConnector::authoritative_server(), vec![]);
        let explicit = PowerdnsCollector::new(
            MockConnector::authoritative_server(),
            vec![DEFAULT_SOCKET.to_string()],
        );
        assert_eq!(implicit.targets(), explicit.targets());

        let mut a = MemoryAccumulator::new();
        let mut b = MemoryAccumulator::new();
        implicit.collect(&mut a).unwrap();
        explicit.collect(&mut b).unwrap();

        assert_eq!(a.records()[0].fields, b.records()[0].fields);
        assert_eq!(a.records()[0].tags, b.records()[0].tags);
    }

    #[test]
    fn test_collect_in_configured_order() {
        let collector = PowerdnsCollector::new(
            MockConnector::two_servers(),
            vec![
                "/run/pdns/b.controlsocket".to_string(),
                "/run/pdns/a.controlsocket".to_string(),
            ],
        );
        let mut acc = MemoryAccumulator::new();
        collector.collect(&mut acc).unwrap();

        let servers: Vec<_> = acc.records().iter().filter_map(|r| r.tag("server")).collect();
        assert_eq!(
            servers,
            vec!["/run/pdns/b.controlsocket", "/run/pdns/a.controlsocket"]
        );
        assert_eq!(acc.records()[0].fields["questions"], 42);
        assert_eq!(acc.records()[1].fields.len(), 38);
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        let mut connector = MockConnector::new();
        connector.add_response("/a", MINIMAL_REPLY);
        connector.add_reply("/b", MockReply::Refused);
        connector.add_response("/c", MINIMAL_REPLY);
        let collector = PowerdnsCollector::new(
            connector,
            vec!["/a".to_string(), "/b".to_string(), "/c".to_string()],
        );
        assert_eq!(collector.policy(), FailurePolicy::FailFast);

        let mut acc = MemoryAccumulator::new();
        let err = collector.collect(&mut acc).unwrap_err();

        assert!(matches!(err, CollectError::Connection { .. }));
        assert_eq!(err.address(), "/b");
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.records()[0].tag("server"), Some("/a"));
        assert_eq!(collector.connector().connections(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_second_server_down_scenario() {
        let collector = PowerdnsCollector::new(
            MockConnector::second_server_down(),
            vec![
                "/run/pdns/a.controlsocket".to_string(),
                "/run/pdns/b.controlsocket".to_string(),
            ],
        );
        let mut acc = MemoryAccumulator::new();
        assert!(collector.collect(&mut acc).is_err());
        assert!(
            acc.records()
                .iter()
                .all(|r| r.tag("server") != Some("/run/pdns/b.controlsocket"))
        );
    }

    #[test]
    fn test_parse_failure_emits_nothing() {
        let collector = PowerdnsCollector::new(MockConnector::garbled_server(), vec![]);
        let mut acc = MemoryAccumulator::new();

        let err = collector.collect(&mut acc).unwrap_err();
        match err {
            CollectError::Parse { address, source } => {
                assert_eq!(address, DEFAULT_SOCKET);
                assert!(matches!(source, ParseError::MissingTerminator { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(acc.is_empty());
    }

    #[test]
    fn test_input_metadata() {
        let collector = PowerdnsCollector::new(MockConnector::new(), vec![]);
        assert_eq!(collector.name(), "powerdns");
        assert_eq!(
            collector.description(),
            "Read metrics from one or many PowerDNS servers"
        );

        let cfg = PowerdnsConfig::from_json(collector.sample_config()).unwrap();
        assert_eq!(cfg.unix_sockets, vec![DEFAULT_SOCKET]);
    }

    #[test]
    fn test_configure_replaces_targets() {
        let mut collector = PowerdnsCollector::new(MockConnector::two_servers(), vec![]);
        let cfg = PowerdnsConfig::new(vec!["/run/pdns/b.controlsocket".to_string()]);
        collector.configure(&cfg.to_value()).unwrap();
        assert_eq!(collector.targets(), vec!["/run/pdns/b.controlsocket"]);

        let mut acc = MemoryAccumulator::new();
        collector.gather(&mut acc).unwrap();
        assert_eq!(acc.records()[0].fields["answers"], 41);
    }

    #[test]
    fn test_from_config() {
        let cfg = PowerdnsConfig::new(vec!["/x".to_string()]);
        let collector = PowerdnsCollector::from_config(MockConnector::new(), &cfg)
            .with_timeout(Duration::from_millis(250))
            .with_max_response_bytes(64);
        assert_eq!(collector.targets(), vec!["/x"]);
        assert_eq!(collector.limits().timeout, Duration::from_millis(250));
        assert_eq!(collector.limits().max_response_bytes, 64);
    }

    // End-to-end tests against real Unix domain sockets.

    /// Serves one connection: waits for the command, optionally answers, then closes.
    fn serve_once(
        path: &Path,
        reply: Option<&'static [u8]>,
        hold: Duration,
    ) -> thread::JoinHandle<Vec<u8>> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = vec![0u8; 64];
            let n = stream.read(&mut received).unwrap();
            received.truncate(n);
            match reply {
                Some(body) => stream.write_all(body).unwrap(),
                None => thread::sleep(hold),
            }
            received
        })
    }

    /// Answers with `piece` every `every` until the client goes away or
    /// `rounds` pieces have been sent.
    fn serve_trickle(
        path: &Path,
        piece: &'static [u8],
        every: Duration,
        rounds: usize,
    ) -> thread::JoinHandle<usize> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut command = [0u8; 64];
            let _ = stream.read(&mut command).unwrap();
            let mut sent = 0;
            while sent < rounds {
                if stream.write_all(piece).is_err() {
                    break;
                }
                sent += 1;
                thread::sleep(every);
            }
            sent
        })
    }

    /// Answers with `reply`, then reports what the next read on the
    /// connection returned.
    fn serve_and_watch_close(
        path: &Path,
        reply: Vec<u8>,
    ) -> thread::JoinHandle<io::Result<usize>> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut command = [0u8; 64];
            let _ = stream.read(&mut command).unwrap();
            stream.write_all(&reply).unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            let mut rest = [0u8; 16];
            stream.read(&mut rest)
        })
    }

    fn socket_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn test_unix_socket_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir, "pdns.controlsocket");
        let server = serve_once(
            Path::new(&path),
            Some(b"questions=42,answers=41,\n"),
            Duration::ZERO,
        );

        let collector = PowerdnsCollector::new(UnixConnector::new(), vec![path.clone()]);
        let mut acc = MemoryAccumulator::new();
        collector.collect(&mut acc).unwrap();

        assert_eq!(server.join().unwrap(), b"show * \n");
        assert_eq!(acc.len(), 1);
        let rec = &acc.records()[0];
        assert_eq!(
            rec.fields,
            FieldSet::from([("questions".to_string(), 42), ("answers".to_string(), 41)])
        );
        assert_eq!(rec.tags, Tags::from([("server".to_string(), path.clone())]));
    }

    #[test]
    fn test_unix_socket_silent_server_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir, "silent.sock");
        let timeout = Duration::from_millis(300);
        let server = serve_once(Path::new(&path), None, Duration::from_millis(1500));

        let collector =
            PowerdnsCollector::new(UnixConnector::new(), vec![path.clone()]).with_timeout(timeout);
        let mut acc = MemoryAccumulator::new();

        let started = Instant::now();
        let err = collector.collect(&mut acc).unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(elapsed >= timeout / 2);
        assert!(elapsed < timeout + Duration::from_secs(1), "took {elapsed:?}");
        assert!(acc.is_empty());
        server.join().unwrap();
    }

    #[test]
    fn test_unix_socket_deadline_spans_every_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir, "trickle.sock");
        let timeout = Duration::from_millis(500);
        let server = serve_trickle(Path::new(&path), b"a=1,", Duration::from_millis(100), 30);

        let collector =
            PowerdnsCollector::new(UnixConnector::new(), vec![path.clone()]).with_timeout(timeout);
        let mut acc = MemoryAccumulator::new();

        let started = Instant::now();
        let err = collector.collect(&mut acc).unwrap_err();
        let elapsed = started.elapsed();

        // Each read succeeds well within the timeout; only the overall
        // deadline can stop the exchange.
        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(elapsed >= timeout / 2, "took {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_millis(400), "took {elapsed:?}");
        assert!(acc.is_empty());
        assert!(server.join().unwrap() < 30);
    }

    #[test]
    fn test_unix_socket_first_ok_second_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let good = socket_path(&dir, "good.sock");
        let missing = socket_path(&dir, "missing.sock");
        let server = serve_once(Path::new(&good), Some(b"uptime=5,"), Duration::ZERO);

        let collector =
            PowerdnsCollector::new(UnixConnector::new(), vec![good.clone(), missing.clone()]);
        let mut acc = MemoryAccumulator::new();
        let err = collector.collect(&mut acc).unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, CollectError::Connection { .. }));
        assert_eq!(err.address(), missing);
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.records()[0].tag("server"), Some(good.as_str()));
    }

    #[test]
    fn test_unix_socket_response_too_large() {
        static BIG: [u8; 8192] = [b'9'; 8192];

        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir, "big.sock");
        let server = serve_once(Path::new(&path), Some(&BIG), Duration::ZERO);

        let collector = PowerdnsCollector::new(UnixConnector::new(), vec![path])
            .with_max_response_bytes(4096);
        let mut acc = MemoryAccumulator::new();
        let err = collector.collect(&mut acc).unwrap_err();

        assert!(matches!(err, CollectError::ResponseTooLarge { limit: 4096, .. }));
        assert!(acc.is_empty());
        let _ = server.join();
    }

    #[test]
    fn test_unix_socket_closed_after_oversized_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir, "oversized.sock");
        // One byte over the limit, so the whole reply is consumed before the
        // collector gives up.
        let server = serve_and_watch_close(Path::new(&path), vec![b'7'; 4097]);

        let collector = PowerdnsCollector::new(UnixConnector::new(), vec![path])
            .with_max_response_bytes(4096);
        let mut acc = MemoryAccumulator::new();
        let err = collector.collect(&mut acc).unwrap_err();
        assert!(matches!(err, CollectError::ResponseTooLarge { limit: 4096, .. }));

        // The server sees EOF, not its own read timeout.
        assert_eq!(server.join().unwrap().unwrap(), 0);
    }
}
