use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ScanError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CONCURRENCY: usize = 100;

/// How the port prober decides whether a port is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeStrategy {
    /// Send a single SYN segment over a raw socket and classify the reply.
    ///
    /// Requires the privilege to open raw sockets.
    #[default]
    HalfOpen,
    /// Complete a full TCP handshake with the operating system's stack.
    Connect,
}

impl FromStr for ProbeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half_open" | "half-open" | "syn" => Ok(ProbeStrategy::HalfOpen),
            "connect" => Ok(ProbeStrategy::Connect),
            other => Err(format!("unknown probe strategy: {other}")),
        }
    }
}

impl fmt::Display for ProbeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStrategy::HalfOpen => write!(f, "half_open"),
            ProbeStrategy::Connect => write!(f, "connect"),
        }
    }
}

/// Which records end up in the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportScope {
    #[default]
    OpenOnly,
    All,
}

/// Settings for one scan. Not changed once the scan has started.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Deadline for every single network operation.
    pub timeout: Duration,
    /// Upper bound of in-flight work items per phase.
    pub max_concurrency: usize,
    pub strategy: ProbeStrategy,
    /// Use an ARP sweep when the targets are private addresses.
    ///
    /// The caller must share a broadcast domain with the targets.
    pub use_link_layer_discovery: bool,
    /// Treat every target address as live.
    pub skip_discovery: bool,
    pub report_scope: ReportScope,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_concurrency: DEFAULT_CONCURRENCY,
            strategy: ProbeStrategy::default(),
            use_link_layer_discovery: true,
            skip_discovery: false,
            report_scope: ReportScope::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.timeout.is_zero() {
            return Err(ScanError::InvalidConfig("timeout must be greater than zero".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ScanError::InvalidConfig("concurrency must be at least 1".into()));
        }
        Ok(())
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
