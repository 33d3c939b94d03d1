use std::io::ErrorKind;
use std::net::SocketAddrV4;
use std::time::Duration;

use async_trait::async_trait;
use netscan_common::models::PortState;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::PortProbe;

/// Full three-way handshake through the OS socket API.
pub struct ConnectProbe;

#[async_trait]
impl PortProbe for ConnectProbe {
    async fn probe(&self, target: SocketAddrV4, probe_timeout: Duration) -> PortState {
        handshake_probe(target, probe_timeout).await
    }
}

/// Refused means closed; timeouts and every other error mean filtered.
///
/// The stream is dropped as soon as the handshake completes.
pub async fn handshake_probe(target: SocketAddrV4, probe_timeout: Duration) -> PortState {
    match timeout(probe_timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            PortState::Open
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => PortState::Closed,
        Ok(Err(e)) => {
            debug!(%target, "connect failed: {e}");
            PortState::Filtered
        }
        Err(_elapsed) => PortState::Filtered,
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
