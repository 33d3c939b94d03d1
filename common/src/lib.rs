//! Shared building blocks for the `netscan` workspace.
//!
//! Everything in here is free of network side effects, apart from the
//! interface/route helpers in [`network::interface`], which only read the
//! host's interface table.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod services;

pub use config::{ProbeStrategy, ReportScope, ScanConfig};
pub use error::ScanError;
