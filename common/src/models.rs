//! Per-port results as they flow from the prober, through identification, into the report.

use std::fmt;
use std::net::Ipv4Addr;

pub const PROTOCOL_TCP: &str = "tcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    Open,
    Closed,
    /// No classifying reply arrived before the deadline.
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
        };
        f.write_str(s)
    }
}

/// Final classification of one (host, port) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeResult {
    pub host: Ipv4Addr,
    pub port: u16,
    pub state: PortState,
}

impl ProbeResult {
    pub fn new(host: Ipv4Addr, port: u16, state: PortState) -> Self {
        Self { host, port, state }
    }

    pub fn protocol(&self) -> &'static str {
        PROTOCOL_TCP
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// A [`ProbeResult`] enriched with whatever the service identifier learned.
///
/// Records for ports that are not open always carry empty `service_name` and `banner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub result: ProbeResult,
    pub service_name: String,
    pub banner: String,
}

impl ServiceRecord {
    pub fn identified(result: ProbeResult, service_name: impl Into<String>, banner: impl Into<String>) -> Self {
        Self {
            result,
            service_name: service_name.into(),
            banner: banner.into(),
        }
    }

    pub fn host(&self) -> Ipv4Addr {
        self.result.host
    }

    pub fn port(&self) -> u16 {
        self.result.port
    }

    pub fn state(&self) -> PortState {
        self.result.state
    }
}

impl From<ProbeResult> for ServiceRecord {
    fn from(result: ProbeResult) -> Self {
        Self::identified(result, "", "")
    }
}

/// Counters collected while the phases run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub addresses: usize,
    pub live_hosts: usize,
    pub probed: usize,
    pub open: usize,
}

/// Outcome of a whole scan, ordered by host then port.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub records: Vec<ServiceRecord>,
    pub stats: ScanStats,
    /// Set when the scan was cancelled and `records` is partial.
    pub cancelled: bool,
}

impl ScanReport {
    pub fn open_records(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.iter().filter(|record| record.result.is_open())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
