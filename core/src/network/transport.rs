//! Raw layer 4 TCP capture for half-open probing.

use std::io;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use pnet::packet::Packet;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::{self, TransportChannelType, TransportProtocol, TransportReceiver, TransportSender};
use tokio::sync::mpsc;
use tracing::debug;

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CHANNEL_TYPE_TCP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Tcp));

/// Creates the raw channel; [`transport::transport_channel`] outside of tests.
pub type TransportOpener = fn(usize, TransportChannelType) -> io::Result<(TransportSender, TransportReceiver)>;

pub struct TransportHandle {
    pub tx: TransportSender,
    pub rx: mpsc::UnboundedReceiver<(Vec<u8>, IpAddr)>,
}

/// Opens the raw TCP channel and starts a listener thread feeding `rx`.
///
/// The thread exits once `rx` is dropped.
pub fn start_packet_capture(opener: TransportOpener) -> anyhow::Result<TransportHandle> {
    let (tx, rx_socket) = opener(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_TCP).context("opening raw TCP transport channel")?;
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    spawn_listener(rx_socket, queue_tx);
    Ok(TransportHandle { tx, rx: queue_rx })
}

fn spawn_listener(mut rx: TransportReceiver, queue_tx: mpsc::UnboundedSender<(Vec<u8>, IpAddr)>) {
    std::thread::spawn(move || {
        let mut iterator = transport::tcp_packet_iter(&mut rx);
        loop {
            match iterator.next_with_timeout(POLL_INTERVAL) {
                Ok(Some((packet, source_ip))) => {
                    if queue_tx.send((packet.packet().to_vec(), source_ip)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    if queue_tx.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("tcp capture read failed: {e}");
                    if queue_tx.is_closed() {
                        break;
                    }
                }
            }
        }
        debug!("tcp capture listener stopped");
    });
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
