//! Half-open probing over a raw TCP transport channel.
//!
//! A single channel serves the whole scan. The capture thread from
//! [`transport`](crate::network::transport) feeds an async dispatcher that hands
//! each reply to the work item waiting on that (remote address, remote port).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use netscan_common::models::PortState;
use netscan_common::network::interface::route_source_v4;
use netscan_protocols::tcp::{self, ProbeReply, ReplyKind, SegmentKind};
use pnet::packet::tcp::TcpPacket;
use pnet::transport::TransportSender;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::PortProbe;
use crate::network::transport::{self, TransportHandle, TransportOpener};

struct Waiter {
    sequence: u32,
    reply: oneshot::Sender<ReplyKind>,
}

type Waiters = Arc<Mutex<HashMap<SocketAddrV4, Waiter>>>;

pub struct SynProbe {
    sender: Mutex<TransportSender>,
    waiters: Waiters,
    source_port: u16,
    dispatcher: JoinHandle<()>,
}

impl SynProbe {
    /// Opens the raw channel and starts the reply dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(opener: TransportOpener) -> anyhow::Result<Self> {
        let TransportHandle { tx, rx } = transport::start_packet_capture(opener)?;
        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let source_port = tcp::random_source_port();
        let dispatcher = tokio::spawn(dispatch(rx, Arc::clone(&waiters), source_port));
        debug!(source_port, "half-open prober ready");

        Ok(Self {
            sender: Mutex::new(tx),
            waiters,
            source_port,
            dispatcher,
        })
    }

    fn send(&self, kind: SegmentKind, source: SocketAddrV4, target: SocketAddrV4, sequence: u32) -> anyhow::Result<()> {
        let segment = tcp::build_segment(kind, source, target, sequence)?;
        let packet = TcpPacket::new(&segment).context("segment shorter than a TCP header")?;
        let mut sender = self.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sender
            .send_to(packet, IpAddr::V4(*target.ip()))
            .with_context(|| format!("sending {kind:?} to {target}"))?;
        Ok(())
    }
}

#[async_trait]
impl PortProbe for SynProbe {
    async fn probe(&self, target: SocketAddrV4, timeout: Duration) -> PortState {
        let Some(source_addr) = route_source_v4(*target.ip()) else {
            warn!(%target, "no route to target");
            return PortState::Filtered;
        };
        let source = SocketAddrV4::new(source_addr, self.source_port);
        let sequence = tcp::random_sequence();

        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.waiters).insert(target, Waiter { sequence, reply: reply_tx });

        if let Err(e) = self.send(SegmentKind::Syn, source, target, sequence) {
            debug!("{e:#}");
            lock(&self.waiters).remove(&target);
            return PortState::Filtered;
        }

        let state = match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(ReplyKind::SynAck)) => {
                if let Err(e) = self.send(SegmentKind::Rst, source, target, sequence.wrapping_add(1)) {
                    debug!("{e:#}");
                }
                PortState::Open
            }
            Ok(Ok(ReplyKind::Reset)) => PortState::Closed,
            Ok(Ok(ReplyKind::Other)) | Ok(Err(_)) | Err(_) => PortState::Filtered,
        };
        lock(&self.waiters).remove(&target);
        state
    }
}

impl Drop for SynProbe {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<(Vec<u8>, IpAddr)>, waiters: Waiters, source_port: u16) {
    while let Some((bytes, source)) = rx.recv().await {
        let IpAddr::V4(source) = source else {
            continue;
        };
        let Some(reply) = tcp::parse_reply(&bytes, source) else {
            continue;
        };
        if reply.local_port == source_port {
            route_reply(&waiters, reply);
        }
    }
}

/// Completes the waiter for `reply.remote` if the reply answers its SYN.
fn route_reply(waiters: &Waiters, reply: ProbeReply) -> bool {
    if reply.kind == ReplyKind::Other {
        return false;
    }
    let mut pending = lock(waiters);
    let answers = pending
        .get(&reply.remote)
        .is_some_and(|waiter| reply.acknowledges(waiter.sequence));
    if !answers {
        return false;
    }
    match pending.remove(&reply.remote) {
        Some(waiter) => waiter.reply.send(reply.kind).is_ok(),
        None => false,
    }
}

fn lock(waiters: &Waiters) -> MutexGuard<'_, HashMap<SocketAddrV4, Waiter>> {
    waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
