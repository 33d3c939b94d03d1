//! # Service identification
//!
//! For every open port: grab whatever the service says first and look up the
//! port's well-known name. Everything else passes through untouched.

use std::net::SocketAddrV4;
use std::time::Duration;

use netscan_common::models::{ProbeResult, ServiceRecord};
use netscan_common::services::service_name;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::context::ScanContext;

pub const BANNER_READ_LIMIT: usize = 1024;
pub const BANNER_MAX_CHARS: usize = 256;

/// Turns probe results into service records, preserving input order.
///
/// Open ports get a service name and a banner; open ports skipped because of
/// cancellation still get the name with an empty banner.
pub async fn identify(ctx: &ScanContext, results: Vec<ProbeResult>) -> Vec<ServiceRecord> {
    let open: Vec<ProbeResult> = results.iter().copied().filter(ProbeResult::is_open).collect();
    info!("identifying services on {} open ports", open.len());

    let wait = ctx.config().timeout;
    let identified = ctx
        .pool()
        .run(open.clone(), move |result| fingerprint(result, wait), unnamed_banner)
        .await;

    let mut identified = open.into_iter().zip(identified).map(|(result, record)| match record {
        Some(record) => record,
        None => unnamed_banner(result),
    });

    results
        .into_iter()
        .map(|result| {
            if result.is_open() {
                identified.next().unwrap_or_else(|| unnamed_banner(result))
            } else {
                ServiceRecord::from(result)
            }
        })
        .collect()
}

async fn fingerprint(result: ProbeResult, wait: Duration) -> ServiceRecord {
    let target = SocketAddrV4::new(result.host, result.port);
    let banner = grab_banner(target, wait).await;
    let record = ServiceRecord::identified(result, service_name(result.port), banner);
    debug!(%target, service = %record.service_name, banner = %record.banner, "identified");
    record
}

fn unnamed_banner(result: ProbeResult) -> ServiceRecord {
    ServiceRecord::identified(result, service_name(result.port), "")
}

/// Connects and performs a single read bounded by `wait`.
///
/// Any failure, or silence, yields an empty banner.
pub async fn grab_banner(target: SocketAddrV4, wait: Duration) -> String {
    let mut stream = match timeout(wait, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(%target, "banner connect failed: {e}");
            return String::new();
        }
        Err(_elapsed) => return String::new(),
    };

    let mut buf = [0u8; BANNER_READ_LIMIT];
    match timeout(wait, stream.read(&mut buf)).await {
        Ok(Ok(n)) => sanitize_banner(&buf[..n]),
        Ok(Err(e)) => {
            debug!(%target, "banner read failed: {e}");
            String::new()
        }
        Err(_elapsed) => String::new(),
    }
}

/// Lossy UTF-8 decode, CR/LF/TAB runs folded into one space, trimmed and capped.
pub fn sanitize_banner(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut folded = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if matches!(ch, '\r' | '\n' | '\t') {
            if !in_break {
                folded.push(' ');
                in_break = true;
            }
        } else {
            folded.push(ch);
            in_break = false;
        }
    }
    let capped: String = folded.trim().chars().take(BANNER_MAX_CHARS).collect();
    capped.trim_end().to_string()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
