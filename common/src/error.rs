use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a scan.
///
/// Anything that goes wrong for a single host or port is *not* represented here;
/// those outcomes are downgraded to [`crate::models::PortState::Filtered`], a dead
/// host or an empty banner and the scan moves on.
#[derive(Debug, Error)]
pub enum ScanError {
    /// An address or port expression could not be parsed.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// The process is not allowed to send or receive raw packets.
    #[error("insufficient privileges: {0}")]
    Permission(String),

    /// Link-layer discovery was requested but no local interface can reach the targets.
    #[error("no usable interface: {0}")]
    Interface(String),

    /// A [`crate::config::ScanConfig`] value is out of bounds.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The report destination could not be created or written.
    #[error("failed to write report to {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Returns `true` for errors raised before any packet leaves the host.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, ScanError::ReportWrite { .. })
    }
}
