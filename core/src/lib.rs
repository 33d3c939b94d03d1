//! The scanning engine: discovery, port probing, service identification and reporting,
//! sequenced by [`Scanner`].

pub mod context;
pub mod discovery;
pub mod identify;
pub mod network;
pub mod pool;
pub mod prober;
pub mod report;
pub mod scanner;

pub use context::{CancelHandle, ScanContext};
pub use discovery::echo::EchoProbe;
pub use prober::PortProbe;
pub use scanner::{ScanPhase, Scanner};
