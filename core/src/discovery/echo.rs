//! Echo probes: "does this address answer a ping within the deadline?"

use std::net::{IpAddr, Ipv4Addr};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::process::Command;
use tracing::{debug, warn};

const PAYLOAD: [u8; 56] = [0; 56];
const PROCESS_GRACE: Duration = Duration::from_secs(1);

/// A single best-effort reachability check.
///
/// Failures of any kind count as "no response".
#[async_trait]
pub trait EchoProbe: Send + Sync {
    async fn is_alive(&self, addr: Ipv4Addr, timeout: Duration) -> bool;
}

/// ICMP echo through a shared `surge-ping` client.
pub struct IcmpEcho {
    client: Client,
}

impl IcmpEcho {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::new(&Config::default()).context("creating ICMP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EchoProbe for IcmpEcho {
    async fn is_alive(&self, addr: Ipv4Addr, timeout: Duration) -> bool {
        let mut pinger = self.client.pinger(IpAddr::V4(addr), PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);
        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok((_packet, rtt)) => {
                debug!(%addr, ?rtt, "echo reply");
                true
            }
            Err(e) => {
                debug!(%addr, "no echo reply: {e}");
                false
            }
        }
    }
}

/// Shells out to the system `ping` utility, one packet per address.
pub struct SystemPing;

#[async_trait]
impl EchoProbe for SystemPing {
    async fn is_alive(&self, addr: Ipv4Addr, timeout: Duration) -> bool {
        let mut command = Command::new("ping");
        command
            .args(ping_args(addr, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout + PROCESS_GRACE, command.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(%addr, "ping could not run: {e}");
                false
            }
            Err(_elapsed) => false,
        }
    }
}

#[cfg(target_os = "macos")]
fn ping_args(addr: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1);
    vec!["-c".into(), "1".into(), "-W".into(), millis.to_string(), addr.to_string()]
}

#[cfg(not(target_os = "macos"))]
fn ping_args(addr: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let seconds = timeout.as_secs_f64().ceil().max(1.0) as u64;
    vec!["-c".into(), "1".into(), "-W".into(), seconds.to_string(), addr.to_string()]
}

/// ICMP through `surge-ping` when a socket can be opened, the system `ping` otherwise.
pub fn default_echo_probe() -> Arc<dyn EchoProbe> {
    match IcmpEcho::new() {
        Ok(probe) => Arc::new(probe),
        Err(e) => {
            warn!("ICMP unavailable ({e:#}), falling back to system ping");
            Arc::new(SystemPing)
        }
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
