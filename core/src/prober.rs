//! # Port prober
//!
//! Classifies every (live host, port) pair as open, closed or filtered.
//!
//! The cross product is flattened into independent work items and pushed
//! through the scan's [`WorkerPool`](crate::pool::WorkerPool). Each item is
//! classified exactly once by the selected [`PortProbe`]; nothing is retried.

pub mod connect;
pub mod syn;

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netscan_common::models::{PortState, ProbeResult};
use netscan_common::network::ports::PortSet;
use netscan_common::network::range::AddressSet;
use netscan_common::{ProbeStrategy, ScanError};
use tracing::{debug, info};

use crate::context::ScanContext;
use crate::network::transport::TransportOpener;
use connect::ConnectProbe;
use syn::SynProbe;

/// One probing strategy. Implementations never fail: anything that prevents a
/// classification is reported as [`PortState::Filtered`].
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn probe(&self, target: SocketAddrV4, timeout: Duration) -> PortState;
}

/// Builds the probe for `strategy`.
///
/// The half-open probe opens its raw channel through `opener`; failing to do so
/// is a [`ScanError::Permission`].
pub fn prepare(strategy: ProbeStrategy, opener: TransportOpener) -> Result<Arc<dyn PortProbe>, ScanError> {
    match strategy {
        ProbeStrategy::Connect => Ok(Arc::new(ConnectProbe)),
        ProbeStrategy::HalfOpen => {
            let probe = SynProbe::open(opener).map_err(|e| ScanError::Permission(format!("{e:#}")))?;
            Ok(Arc::new(probe))
        }
    }
}

/// Host-major cross product of `hosts` and `ports`.
pub fn work_items(hosts: &AddressSet, ports: &PortSet) -> Vec<SocketAddrV4> {
    hosts
        .iter()
        .flat_map(|&host| ports.iter().map(move |&port| SocketAddrV4::new(host, port)))
        .collect()
}

/// Probes every pair and returns the results ordered by host, then port.
///
/// Items skipped because of cancellation are absent from the output.
pub async fn probe(
    ctx: &ScanContext,
    hosts: &AddressSet,
    ports: &PortSet,
    prober: Arc<dyn PortProbe>,
) -> Vec<ProbeResult> {
    let items = work_items(hosts, ports);
    info!("probing {} ports on {} hosts", ports.len(), hosts.len());

    let timeout = ctx.config().timeout;
    let outcomes = ctx
        .pool()
        .run(
            items,
            move |target| {
                let prober = Arc::clone(&prober);
                async move {
                    let state = prober.probe(target, timeout).await;
                    debug!(%target, %state, "probe finished");
                    if state == PortState::Open {
                        info!("{}:{} is open", target.ip(), target.port());
                    }
                    ProbeResult::new(*target.ip(), target.port(), state)
                }
            },
            |target| ProbeResult::new(*target.ip(), target.port(), PortState::Filtered),
        )
        .await;

    outcomes.into_iter().flatten().collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
