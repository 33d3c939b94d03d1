//! # Scan orchestration
//!
//! [`Scanner`] owns one scan's configuration and walks it through
//! `Idle → Discovering → Probing → Identifying → Reporting → Done`.
//!
//! Everything that can make the scan impossible (bad ranges, bad settings,
//! missing privileges or interfaces) is checked while still `Idle`; on failure
//! the scanner moves to `Failed` and nothing is sent. Once a phase has started,
//! per-item problems are absorbed by the phase and the scan always produces a
//! [`ScanReport`].

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use netscan_common::models::{ScanReport, ScanStats, ServiceRecord};
use netscan_common::network::ports::{PortSet, parse_port_range};
use netscan_common::network::range::AddressSet;
use netscan_common::network::target::parse_address_range;
use netscan_common::{ReportScope, ScanConfig, ScanError};
use tracing::{Instrument, error, info, info_span, warn};

use crate::context::{CancelHandle, ScanContext};
use crate::discovery::Discovery;
use crate::discovery::echo::EchoProbe;
use crate::network::transport::TransportOpener;
use crate::prober::{self, PortProbe};
use crate::{identify, report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Discovering,
    Probing,
    Identifying,
    Reporting,
    Done,
    Failed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Discovering => "discovering",
            ScanPhase::Probing => "probing",
            ScanPhase::Identifying => "identifying",
            ScanPhase::Reporting => "reporting",
            ScanPhase::Done => "done",
            ScanPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

type PhaseObserver = Box<dyn Fn(ScanPhase) + Send + Sync>;

/// Everything acquired before the first packet is sent.
struct ScanPlan {
    addresses: AddressSet,
    ports: PortSet,
    discovery: Discovery,
    prober: Arc<dyn PortProbe>,
}

pub struct Scanner {
    config: ScanConfig,
    cancel: CancelHandle,
    echo: Option<Arc<dyn EchoProbe>>,
    on_phase: Option<PhaseObserver>,
    transport_opener: TransportOpener,
    phase: Mutex<ScanPhase>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::new(),
            echo: None,
            on_phase: None,
            transport_opener: pnet::transport::transport_channel,
            phase: Mutex::new(ScanPhase::Idle),
        }
    }

    /// Replaces the default echo probe used by the echo sweep.
    pub fn with_echo_probe(mut self, probe: Arc<dyn EchoProbe>) -> Self {
        self.echo = Some(probe);
        self
    }

    /// Replaces how the half-open prober opens its raw TCP channel.
    pub fn with_transport_opener(mut self, opener: TransportOpener) -> Self {
        self.transport_opener = opener;
        self
    }

    /// Called after every phase change.
    pub fn on_phase_change(mut self, observer: impl Fn(ScanPhase) + Send + Sync + 'static) -> Self {
        self.on_phase = Some(Box::new(observer));
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs discovery, probing and identification; leaves the scanner in `Reporting`.
    ///
    /// Only configuration problems are errors. A cancelled scan returns the
    /// partial report with [`ScanReport::cancelled`] set.
    pub async fn run(&self, addr_text: &str, port_text: &str) -> Result<ScanReport, ScanError> {
        if self.phase() != ScanPhase::Idle {
            return Err(ScanError::InvalidConfig(format!("scanner already used (phase: {})", self.phase())));
        }

        let plan = match self.prepare(addr_text, port_text) {
            Ok(plan) => plan,
            Err(e) => {
                error!("scan aborted: {e}");
                self.transition(ScanPhase::Failed);
                return Err(e);
            }
        };
        let ScanPlan { addresses, ports, discovery, prober } = plan;
        let ctx = ScanContext::new(self.config.clone(), self.cancel.clone());
        let mut stats = ScanStats { addresses: addresses.len(), ..ScanStats::default() };

        self.transition(ScanPhase::Discovering);
        let live = discovery.run(&ctx, &addresses).instrument(info_span!("discovery")).await;
        stats.live_hosts = live.len();

        self.transition(ScanPhase::Probing);
        let results = prober::probe(&ctx, &live, &ports, prober)
            .instrument(info_span!("probing"))
            .await;
        stats.probed = results.len();

        self.transition(ScanPhase::Identifying);
        let records = identify::identify(&ctx, results)
            .instrument(info_span!("identification"))
            .await;

        let records = select_records(records, self.config.report_scope);
        stats.open = records.iter().filter(|record| record.result.is_open()).count();
        let cancelled = ctx.is_cancelled();
        if cancelled {
            warn!("scan cancelled, report is partial");
        }

        self.transition(ScanPhase::Reporting);
        Ok(ScanReport { records, stats, cancelled })
    }

    /// Writes `report` and finishes the scan.
    ///
    /// On failure the scanner stays in `Reporting`, so the same report can be
    /// written again to another destination.
    pub fn write_report(&self, report: &ScanReport, destination: impl AsRef<Path>) -> Result<(), ScanError> {
        if self.phase() != ScanPhase::Reporting {
            return Err(ScanError::InvalidConfig(format!(
                "no report to write (phase: {})",
                self.phase()
            )));
        }
        match report::write_report(&report.records, destination) {
            Ok(()) => {
                self.transition(ScanPhase::Done);
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                Err(e)
            }
        }
    }

    fn prepare(&self, addr_text: &str, port_text: &str) -> Result<ScanPlan, ScanError> {
        self.config.validate()?;
        let addresses = parse_address_range(addr_text)?;
        let ports = parse_port_range(port_text)?;
        info!(
            "{} address(es), {} port(s), {} strategy, {} worker(s), {:?} timeout",
            addresses.len(),
            ports.len(),
            self.config.strategy,
            self.config.max_concurrency,
            self.config.timeout
        );

        let discovery = Discovery::plan(&addresses, &self.config, self.echo.clone())?;
        let prober = prober::prepare(self.config.strategy, self.transport_opener)?;
        Ok(ScanPlan { addresses, ports, discovery, prober })
    }

    fn transition(&self, next: ScanPhase) {
        let previous = {
            let mut phase = self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *phase, next)
        };
        info!("scan phase {previous} -> {next}");
        if let Some(observer) = &self.on_phase {
            observer(next);
        }
    }
}

fn select_records(records: Vec<ServiceRecord>, scope: ReportScope) -> Vec<ServiceRecord> {
    match scope {
        ReportScope::All => records,
        ReportScope::OpenOnly => records.into_iter().filter(|record| record.result.is_open()).collect(),
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
