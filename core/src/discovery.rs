//! # Host discovery
//!
//! Narrows the target [`AddressSet`] down to the hosts that answer.
//!
//! Two sweeps are available:
//! 1. **Link layer**: one ARP request per target on the interface that shares its
//!    broadcast domain. Only meaningful when the scanner sits on the same LAN as
//!    the targets; that is a precondition, not something detected at runtime.
//! 2. **Echo**: one echo probe per address through the scan's worker pool.
//!
//! Which one runs is decided up front by [`Discovery::plan`] so that missing
//! interfaces or privileges surface before any packet is sent.

pub mod arp;
pub mod echo;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use netscan_common::network::range::AddressSet;
use netscan_common::{ScanConfig, ScanError};
use tracing::{debug, info};

use crate::context::ScanContext;
use arp::ArpSweep;
use echo::EchoProbe;

pub enum Discovery {
    /// Every address is treated as live.
    Skip,
    LinkLayer(ArpSweep),
    Echo(Arc<dyn EchoProbe>),
}

impl Discovery {
    /// Picks the sweep for `addresses` and acquires what it needs.
    ///
    /// `echo` overrides the default echo probe.
    pub fn plan(
        addresses: &AddressSet,
        config: &ScanConfig,
        echo: Option<Arc<dyn EchoProbe>>,
    ) -> Result<Self, ScanError> {
        if config.skip_discovery {
            return Ok(Discovery::Skip);
        }
        if wants_link_layer(addresses, config) {
            return Ok(Discovery::LinkLayer(ArpSweep::prepare(addresses)?));
        }
        Ok(Discovery::Echo(echo.unwrap_or_else(echo::default_echo_probe)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Discovery::Skip => "none",
            Discovery::LinkLayer(_) => "arp",
            Discovery::Echo(_) => "echo",
        }
    }

    /// Returns the live subset of `addresses`, in input order.
    pub async fn run(self, ctx: &ScanContext, addresses: &AddressSet) -> AddressSet {
        info!("sweeping {} addresses via {}", addresses.len(), self.name());
        let live = match self {
            Discovery::Skip => return addresses.clone(),
            Discovery::LinkLayer(sweep) => sweep.run(ctx.config().timeout, ctx.cancel_handle()).await,
            Discovery::Echo(probe) => echo_sweep(ctx, addresses, probe).await,
        };
        let live = addresses.filter(|addr| live.contains(addr));
        info!("{} of {} hosts are up", live.len(), addresses.len());
        live
    }
}

/// Link-layer discovery runs only when enabled and the first target is a private address.
pub fn wants_link_layer(addresses: &AddressSet, config: &ScanConfig) -> bool {
    config.use_link_layer_discovery && addresses.first().is_some_and(|addr| addr.is_private())
}

async fn echo_sweep(ctx: &ScanContext, addresses: &AddressSet, probe: Arc<dyn EchoProbe>) -> HashSet<Ipv4Addr> {
    let timeout = ctx.config().timeout;
    let outcomes = ctx
        .pool()
        .run(
            addresses.as_slice().to_vec(),
            move |addr| {
                let probe = Arc::clone(&probe);
                async move {
                    let alive = probe.is_alive(addr, timeout).await;
                    debug!(%addr, alive, "echo probe finished");
                    (addr, alive)
                }
            },
            |addr| (addr, false),
        )
        .await;

    outcomes
        .into_iter()
        .flatten()
        .filter_map(|(addr, alive)| alive.then_some(addr))
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelHandle;
    use async_trait::async_trait;
    use netscan_common::network::target::parse_address_range;
    use std::time::Duration;

    struct FakeEcho {
        up: Vec<Ipv4Addr>,
    }

    #[async_trait]
    impl EchoProbe for FakeEcho {
        async fn is_alive(&self, addr: Ipv4Addr, _timeout: Duration) -> bool {
            // Finish out of order.
            tokio::time::sleep(Duration::from_millis(u64::from(10 - addr.octets()[3] % 10))).await;
            self.up.contains(&addr)
        }
    }

    fn ctx(config: ScanConfig) -> ScanContext {
        ScanContext::new(config, CancelHandle::new())
    }

    fn echo_config() -> ScanConfig {
        ScanConfig {
            use_link_layer_discovery: false,
            max_concurrency: 4,
            timeout: Duration::from_millis(200),
            ..ScanConfig::default()
        }
    }

    #[test]
    fn link_layer_only_for_private_first_address() {
        let lan = parse_address_range("192.168.1.1-5").unwrap();
        let public = parse_address_range("8.8.8.8").unwrap();

        assert!(wants_link_layer(&lan, &ScanConfig::default()));
        assert!(!wants_link_layer(&public, &ScanConfig::default()));
        assert!(!wants_link_layer(&lan, &echo_config()));
    }

    #[test]
    fn skip_discovery_takes_precedence() {
        let config = ScanConfig { skip_discovery: true, ..ScanConfig::default() };
        let lan = parse_address_range("192.168.1.1-5").unwrap();
        let plan = Discovery::plan(&lan, &config, None).unwrap();
        assert!(matches!(plan, Discovery::Skip));
    }

    #[test]
    fn plan_uses_injected_echo_probe() {
        let addresses = parse_address_range("8.8.8.8").unwrap();
        let probe: Arc<dyn EchoProbe> = Arc::new(FakeEcho { up: vec![] });
        let plan = Discovery::plan(&addresses, &ScanConfig::default(), Some(probe)).unwrap();
        assert_eq!(plan.name(), "echo");
    }

    #[tokio::test]
    async fn echo_sweep_returns_live_hosts_in_input_order() {
        let addresses = parse_address_range("10.0.0.1-10.0.0.9").unwrap();
        let up = vec![Ipv4Addr::new(10, 0, 0, 7), Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 5)];
        let discovery = Discovery::Echo(Arc::new(FakeEcho { up }));

        let live = discovery.run(&ctx(echo_config()), &addresses).await;

        assert_eq!(
            live.as_slice(),
            &[Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 7)]
        );
    }

    #[tokio::test]
    async fn skip_returns_every_address() {
        let addresses = parse_address_range("10.0.0.1-3").unwrap();
        let live = Discovery::Skip.run(&ctx(echo_config()), &addresses).await;
        assert_eq!(live, addresses);
    }

    #[tokio::test]
    async fn cancelled_sweep_finds_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let ctx = ScanContext::new(echo_config(), cancel);
        let addresses = parse_address_range("10.0.0.1-3").unwrap();
        let discovery = Discovery::Echo(Arc::new(FakeEcho { up: addresses.as_slice().to_vec() }));

        assert!(discovery.run(&ctx, &addresses).await.is_empty());
    }
}
