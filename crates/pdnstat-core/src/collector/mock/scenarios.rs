//! Pre-built mock connector scenarios for testing.
//!
//! Replies are captured from real PowerDNS servers.

use super::connector::{MockConnector, MockReply};
use crate::collector::DEFAULT_SOCKET;

/// `show *` reply of a PowerDNS authoritative server (38 fields).
pub const AUTHORITATIVE_REPLY: &str = "corrupt-packets=0,deferred-cache-inserts=0,\
deferred-cache-lookup=0,dnsupdate-answers=0,dnsupdate-changes=0,dnsupdate-queries=0,\
dnsupdate-refused=0,packetcache-hit=0,packetcache-miss=1,packetcache-size=0,\
query-cache-hit=0,query-cache-miss=6,rd-queries=1,recursing-answers=0,\
recursing-questions=0,recursion-unanswered=0,security-status=3,servfail-packets=0,\
signatures=0,tcp-answers=0,tcp-queries=0,timedout-packets=0,udp-answers=1,\
udp-answers-bytes=50,udp-do-queries=0,udp-queries=0,udp4-answers=1,udp4-queries=1,\
udp6-answers=0,udp6-queries=0,key-cache-size=0,latency=26,meta-cache-size=1,\
qsize-q=0,signature-cache-size=0,sys-msec=2889,uptime=86317,user-msec=2167,\n";

/// Small reply used by multi-server scenarios.
pub const MINIMAL_REPLY: &str = "questions=42,answers=41,\n";

impl MockConnector {
    /// A single authoritative server listening on the default socket.
    pub fn authoritative_server() -> Self {
        let mut connector = Self::new();
        connector.add_response(DEFAULT_SOCKET, AUTHORITATIVE_REPLY);
        connector
    }

    /// Two healthy servers at `/run/pdns/a.controlsocket` and `/run/pdns/b.controlsocket`.
    pub fn two_servers() -> Self {
        let mut connector = Self::new();
        connector.add_response("/run/pdns/a.controlsocket", AUTHORITATIVE_REPLY);
        connector.add_response("/run/pdns/b.controlsocket", MINIMAL_REPLY);
        connector
    }

    /// A healthy server followed by one whose control socket refuses connections.
    pub fn second_server_down() -> Self {
        let mut connector = Self::new();
        connector.add_response("/run/pdns/a.controlsocket", MINIMAL_REPLY);
        connector.add_reply("/run/pdns/b.controlsocket", MockReply::Refused);
        connector
    }

    /// A server answering with a truncated, unterminated reply.
    pub fn garbled_server() -> Self {
        let mut connector = Self::new();
        connector.add_response(DEFAULT_SOCKET, "corrupt-packets=0,latency=2");
        connector
    }
}
