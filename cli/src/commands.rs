pub mod scan;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use netscan_common::config::{DEFAULT_CONCURRENCY, ProbeStrategy, ReportScope, ScanConfig};

use crate::terminal::logging::Verbosity;

#[derive(Parser, Debug)]
#[command(name = "netscan", version)]
#[command(about = "Finds live hosts, open ports and the services behind them.")]
pub struct CommandLine {
    /// Targets: 10.0.0.1, 10.0.0.1-20, 10.0.0.0/24 or a comma separated mix
    pub target: String,

    /// Ports to probe, e.g. 22,80,443 or 1-1024
    #[arg(short = 'p', long, default_value = "1-1024")]
    pub ports: String,

    /// Maximum number of probes in flight
    #[arg(short = 't', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub threads: usize,

    /// Deadline for every network operation, in seconds
    #[arg(short = 'T', long, default_value_t = 2.0)]
    pub timeout: f64,

    /// Probing strategy: syn (half-open, needs root) or connect
    #[arg(long = "scan-type", default_value = "syn")]
    pub scan_type: ProbeStrategy,

    /// Never use an ARP sweep, even for private targets
    #[arg(long)]
    pub no_arp: bool,

    /// Treat every target as live
    #[arg(long)]
    pub skip_discovery: bool,

    /// Also report closed and filtered ports
    #[arg(long)]
    pub all: bool,

    /// Where to write the CSV report
    #[arg(short = 'o', long, default_value = "scan_report.csv")]
    pub output: PathBuf,

    /// Show debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and the final results
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write every log event to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }

    pub fn scan_config(&self) -> anyhow::Result<ScanConfig> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|e| anyhow!("invalid timeout '{}': {e}", self.timeout))?;

        Ok(ScanConfig {
            timeout,
            max_concurrency: self.threads,
            strategy: self.scan_type,
            use_link_layer_discovery: !self.no_arp,
            skip_discovery: self.skip_discovery,
            report_scope: if self.all { ReportScope::All } else { ReportScope::OpenOnly },
        })
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
