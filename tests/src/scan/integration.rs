#![cfg(test)]
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netscan_common::models::PortState;
use netscan_common::{ProbeStrategy, ReportScope, ScanConfig};
use netscan_core::{EchoProbe, ScanPhase, Scanner};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Every address answers, so loopback scans do not depend on ICMP permissions.
struct AlwaysUp;

#[async_trait]
impl EchoProbe for AlwaysUp {
    async fn is_alive(&self, _addr: Ipv4Addr, _timeout: Duration) -> bool {
        true
    }
}

fn connect_config() -> ScanConfig {
    ScanConfig {
        timeout: Duration::from_secs(2),
        max_concurrency: 10,
        strategy: ProbeStrategy::Connect,
        use_link_layer_discovery: false,
        ..ScanConfig::default()
    }
}

fn scanner(config: ScanConfig) -> Scanner {
    Scanner::new(config).with_echo_probe(Arc::new(AlwaysUp))
}

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let SocketAddr::V4(addr) = listener.local_addr().unwrap() else {
        unreachable!("bound to an IPv4 address");
    };
    (listener, addr.port())
}

/// Accepts connections forever, greeting each one with `banner`.
fn serve_banner(listener: TcpListener, banner: &'static [u8]) {
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(banner).await;
        }
    });
}

#[tokio::test]
async fn scan_outside_listener_port_reports_nothing_open() {
    let (_listener, port) = listener().await;
    assert_ne!(port, 1);

    let scanner = scanner(connect_config());
    let report = scanner.run("127.0.0.1", "1-1").await.unwrap();

    assert_eq!(report.open_records().count(), 0);
    assert!(report.records.is_empty());
    assert_eq!(report.stats.live_hosts, 1);
    assert_eq!(report.stats.probed, 1);
    assert_eq!(scanner.phase(), ScanPhase::Reporting);
}

#[tokio::test]
async fn scan_of_listener_port_reports_one_open_record() {
    let (listener, port) = listener().await;
    serve_banner(listener, b"220 netscan test ftp\r\n");

    let scanner = scanner(connect_config());
    let report = scanner.run("127.0.0.1", &port.to_string()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.host(), Ipv4Addr::LOCALHOST);
    assert_eq!(record.port(), port);
    assert_eq!(record.state(), PortState::Open);
    assert_eq!(record.banner, "220 netscan test ftp");
    assert!(!record.service_name.is_empty());
}

#[tokio::test]
async fn full_report_keeps_closed_ports_unidentified() {
    let (listener, port) = listener().await;
    serve_banner(listener, b"hello\n");

    let config = ScanConfig { report_scope: ReportScope::All, ..connect_config() };
    let scanner = scanner(config);
    let report = scanner.run("127.0.0.1", &format!("1,{port}")).await.unwrap();

    assert_eq!(report.records.len(), 2);
    for record in &report.records {
        if record.state() != PortState::Open {
            assert_eq!(record.service_name, "");
            assert_eq!(record.banner, "");
        }
    }
    assert_eq!(report.open_records().count(), 1);
}

#[tokio::test]
async fn report_file_matches_records() {
    let (listener, port) = listener().await;
    serve_banner(listener, b"SSH-2.0-netscan, \"quoted\"\r\n");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_report.csv");

    let scanner = scanner(connect_config());
    let report = scanner.run("127.0.0.1", &port.to_string()).await.unwrap();
    scanner.write_report(&report, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("IP,Port,Protocol,Status,Service,Banner"));
    let row = lines.next().unwrap();
    assert!(row.starts_with(&format!("127.0.0.1,{port},tcp,open,")));
    assert!(row.ends_with("\"SSH-2.0-netscan, \"\"quoted\"\"\""));
    assert_eq!(lines.next(), None);
    assert_eq!(scanner.phase(), ScanPhase::Done);
}

#[tokio::test]
async fn cancelling_mid_probe_yields_partial_report() {
    let (listener, port) = listener().await;
    serve_banner(listener, b"");

    let config = ScanConfig { report_scope: ReportScope::All, ..connect_config() };
    let scanner = scanner(config);
    let cancel = scanner.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let report = scanner.run("127.0.0.1", "1-65535").await.unwrap();

    assert!(report.cancelled);
    assert!(report.stats.probed < 65535);
    assert_eq!(report.records.len(), report.stats.probed);
    assert!(report.records.windows(2).all(|w| w[0].port() < w[1].port()));
    assert!(report.records.iter().all(|r| r.port() != port || r.state() == PortState::Open));
    assert_eq!(scanner.phase(), ScanPhase::Reporting);
}

#[tokio::test]
async fn invalid_target_never_starts_discovery() {
    let scanner = scanner(connect_config());
    let err = scanner.run("127.0.0.1/33", "80").await.unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(scanner.phase(), ScanPhase::Failed);
}
