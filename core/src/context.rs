use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use netscan_common::ScanConfig;

use crate::pool::WorkerPool;

/// Shared cancellation flag for one scan.
///
/// Cloning yields another handle to the same flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-scan state handed to every phase.
#[derive(Debug, Clone)]
pub struct ScanContext {
    config: ScanConfig,
    cancel: CancelHandle,
}

impl ScanContext {
    pub fn new(config: ScanConfig, cancel: CancelHandle) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A fresh pool sized by `max_concurrency`, tied to this scan's cancellation flag.
    pub fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.config.max_concurrency, self.cancel.clone())
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
