//! CSV report sink.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use csv::{Terminator, WriterBuilder};
use netscan_common::ScanError;
use netscan_common::models::ServiceRecord;
use tracing::info;

pub const REPORT_HEADER: [&str; 6] = ["IP", "Port", "Protocol", "Status", "Service", "Banner"];

/// Writes `records` to `destination`, replacing any existing file.
///
/// `records` is only borrowed; a failed write leaves it untouched.
pub fn write_report(records: &[ServiceRecord], destination: impl AsRef<Path>) -> Result<(), ScanError> {
    let path = destination.as_ref();
    let report_error = |source: io::Error| ScanError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(report_error)?;
    write_records(records, file).map_err(|e| report_error(io::Error::from(e)))?;
    info!("wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Serializes the header and one row per record into `out`.
pub fn write_records<W: Write>(records: &[ServiceRecord], out: W) -> csv::Result<()> {
    let mut writer = WriterBuilder::new().terminator(Terminator::Any(b'\n')).from_writer(out);
    writer.write_record(REPORT_HEADER)?;
    for record in records {
        writer.write_record([
            record.host().to_string().as_str(),
            record.port().to_string().as_str(),
            record.result.protocol(),
            record.state().to_string().as_str(),
            record.service_name.as_str(),
            record.banner.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
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
    use netscan_common::models::{PortState, ProbeResult};
    use std::net::Ipv4Addr;

    fn records() -> Vec<ServiceRecord> {
        let host = Ipv4Addr::new(192, 168, 1, 10);
        vec![
            ServiceRecord::identified(ProbeResult::new(host, 22, PortState::Open), "ssh", "SSH-2.0-OpenSSH_9.6"),
            ServiceRecord::identified(
                ProbeResult::new(host, 80, PortState::Open),
                "http",
                "HTTP/1.1 400 Bad Request, \"oops\"",
            ),
            ServiceRecord::from(ProbeResult::new(host, 443, PortState::Closed)),
        ]
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan_report.csv");

        write_report(&records(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "IP,Port,Protocol,Status,Service,Banner");
        assert_eq!(lines[1], "192.168.1.10,22,tcp,open,ssh,SSH-2.0-OpenSSH_9.6");
        assert_eq!(lines[2], "192.168.1.10,80,tcp,open,http,\"HTTP/1.1 400 Bad Request, \"\"oops\"\"\"");
        assert_eq!(lines[3], "192.168.1.10,443,tcp,closed,,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn banner_with_delimiters_reads_back_intact() {
        let mut out = Vec::new();
        write_records(&records(), &mut out).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][5], "HTTP/1.1 400 Bad Request, \"oops\"");
    }

    #[test]
    fn empty_report_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_report(&[], &path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "IP,Port,Protocol,Status,Service,Banner\n");
    }

    #[test]
    fn unwritable_destination_is_a_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("scan_report.csv");
        let records = records();

        let err = write_report(&records, &path).unwrap_err();

        match err {
            ScanError::ReportWrite { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(records.len(), 3);
    }
}
