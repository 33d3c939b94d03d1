use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use colored::*;
use netscan_common::ProbeStrategy;
use netscan_common::models::{ScanReport, ServiceRecord};
use netscan_core::{ScanPhase, Scanner};
use tracing::warn;

use crate::commands::CommandLine;
use crate::terminal::{colors, input::InputHandle, print, spinner};

type Detail = (String, ColoredString);

pub async fn scan(commands: &CommandLine) -> anyhow::Result<()> {
    let config = commands.scan_config()?;
    let quiet = commands.quiet;

    if config.strategy == ProbeStrategy::HalfOpen && !is_root::is_root() {
        warn!("half-open scanning needs raw sockets: run as root or pass --scan-type connect");
    }

    print::header("starting scanner", quiet);
    if !quiet {
        print::print_status(format!(
            "{} strategy, {} workers, {:.1}s timeout",
            config.strategy,
            config.max_concurrency,
            config.timeout.as_secs_f64()
        ));
        print::print_status(spinner::TIP);
    }

    let scanner = Scanner::new(config).on_phase_change(move |phase| announce_phase(phase, quiet));
    let cancel = scanner.cancel_handle();

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancelling, waiting for in-flight probes to finish");
                cancel.cancel();
            }
        })
    };
    let input = InputHandle::start(cancel);

    let start_time: Instant = Instant::now();
    let outcome = scanner.run(&commands.target, &commands.ports).await;

    drop(input);
    ctrl_c.abort();
    let report: ScanReport = outcome?;

    scan_ends(&report, start_time.elapsed(), quiet);
    scanner.write_report(&report, &commands.output)?;
    print::print_status(format!("report written to {}", commands.output.display()));
    print::end_of_program();
    Ok(())
}

fn announce_phase(phase: ScanPhase, quiet: bool) {
    if quiet {
        return;
    }
    match phase {
        ScanPhase::Discovering => print::phase(1, 3, "host discovery"),
        ScanPhase::Probing => print::phase(2, 3, "port scan"),
        ScanPhase::Identifying => print::phase(3, 3, "service identification"),
        _ => {}
    }
}

fn scan_ends(report: &ScanReport, total_time: Duration, quiet: bool) {
    let by_host = group_open_ports(report);
    if by_host.is_empty() {
        print::header("zero open ports", quiet);
        if !quiet {
            print::no_results();
        }
    } else {
        print::header("open ports", quiet);
        print_hosts(&by_host);
    }
    print_summary(report, total_time);
}

fn group_open_ports(report: &ScanReport) -> BTreeMap<Ipv4Addr, Vec<&ServiceRecord>> {
    let mut by_host: BTreeMap<Ipv4Addr, Vec<&ServiceRecord>> = BTreeMap::new();
    for record in report.open_records() {
        by_host.entry(record.host()).or_default().push(record);
    }
    by_host
}

fn print_hosts(by_host: &BTreeMap<Ipv4Addr, Vec<&ServiceRecord>>) {
    for (idx, (host, records)) in by_host.iter().enumerate() {
        print::tree_head(idx, &host.to_string());
        let details: Vec<Detail> = records.iter().map(|record| port_detail(record)).collect();
        print::as_tree_one_level(details);
        if idx + 1 != by_host.len() {
            print::blank();
        }
    }
}

fn port_detail(record: &ServiceRecord) -> Detail {
    let key = format!("{}/{}", record.port(), record.result.protocol());
    let service = record.service_name.color(colors::PRIMARY);
    let value = if record.banner.is_empty() {
        service
    } else {
        format!("{} {}", service, record.banner.dimmed()).normal()
    };
    (key, value)
}

fn print_summary(report: &ScanReport, total_time: Duration) {
    let stats = report.stats;
    let open: ColoredString = format!("{} open ports", stats.open).bold().green();
    let hosts: ColoredString = format!("{}/{} hosts up", stats.live_hosts, stats.addresses).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output = format!("Scan complete: {open} on {hosts} in {total_time}").color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output.to_string());
    if report.cancelled {
        warn!("scan was cancelled, {} of the planned probes ran", stats.probed);
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
