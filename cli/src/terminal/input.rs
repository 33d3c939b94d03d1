use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use netscan_core::CancelHandle;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches the keyboard for 'q' or Ctrl-C and cancels the scan.
///
/// Raw mode is only entered when stdin is a terminal and is always restored on drop.
pub struct InputHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl InputHandle {
    pub fn start(cancel: CancelHandle) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        if !std::io::stdin().is_terminal() {
            return Self { stop, thread: None };
        }

        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            if enable_raw_mode().is_err() {
                return;
            }
            while !flag.load(Ordering::Relaxed) {
                match event::poll(POLL_INTERVAL) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if should_interrupt(&key_event) {
                                warn!("cancelling, waiting for in-flight probes to finish");
                                cancel.cancel();
                                break;
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
            let _ = disable_raw_mode();
        });

        Self { stop, thread: Some(thread) }
    }
}

pub fn should_interrupt(key_event: &KeyEvent) -> bool {
    let is_q = key_event.code == KeyCode::Char('q');
    let is_ctrl_c = key_event.code == KeyCode::Char('c') && key_event.modifiers.contains(KeyModifiers::CONTROL);
    (is_q || is_ctrl_c) && key_event.kind == KeyEventKind::Press
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = disable_raw_mode();
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
