//! ntflash-dummy - no-op command backend
//!
//! Backs `--dry-run` and the orchestrator tests: every session opens, every
//! command succeeds, and nothing touches USB or the filesystem. Each
//! executed command is logged and appended to a shared journal so callers
//! can inspect exactly what a real run would have sent.

use std::sync::{Arc, Mutex};

use ntflash_core::command::{status, Command, Reply};
use ntflash_core::error::{ConnectError, TransportError};
use ntflash_core::port::{CommandPort, PortFactory, SegmentFn};

type Journal = Arc<Mutex<Vec<String>>>;

/// A port that acknowledges everything.
pub struct DryRunPort {
    role: &'static str,
    journal: Journal,
}

/// Number of simulated segment callbacks per data-phase command. Enough to
/// exercise the progress path without flooding the event stream.
const SIMULATED_SEGMENTS: usize = 4;

impl CommandPort for DryRunPort {
    fn execute(
        &mut self,
        command: &Command<'_>,
        progress: Option<SegmentFn<'_>>,
    ) -> Result<Reply, TransportError> {
        let line = format!("{}: {}", self.role, command.render());
        log::info!("[dry run] would send {}", line);
        self.journal.lock().unwrap().push(line);

        if let (Some(data), Some(callback)) = (command.data(), progress) {
            let total = data.len();
            for step in 1..=SIMULATED_SEGMENTS {
                callback(total * step / SIMULATED_SEGMENTS, total);
            }
        }

        Ok(Reply::new(status::SUCCESS, vec![status::SUCCESS]))
    }
}

/// Factory handing out [`DryRunPort`]s and collecting their journal.
#[derive(Default)]
pub struct DryRunFactory {
    journal: Journal,
}

impl DryRunFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything executed so far, in order, one rendered command per line.
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

impl PortFactory for DryRunFactory {
    type Sdp = DryRunPort;
    type Loader = DryRunPort;

    fn open_sdp(&mut self) -> Result<DryRunPort, ConnectError> {
        log::debug!("[dry run] would open SDP device");
        Ok(DryRunPort {
            role: "sdp",
            journal: Arc::clone(&self.journal),
        })
    }

    fn open_loader(&mut self) -> Result<DryRunPort, ConnectError> {
        log::debug!("[dry run] would open flashloader device");
        Ok(DryRunPort {
            role: "loader",
            journal: Arc::clone(&self.journal),
        })
    }
}
