//! ntflash-device - the two-phase flash engine
//!
//! Flashing a disting NT is a handover between two programs on the same
//! chip: the ROM bootloader speaking SDP, and the RAM-resident flashloader
//! it is taught to run. [`sdp::SdpPhase`] drives the first,
//! [`loader::LoaderPhase`] the second, and [`orchestrator::Orchestrator`]
//! sequences them across the USB re-enumeration in between.
//!
//! Everything here is generic over [`ntflash_core::PortFactory`]; no USB
//! code lives in this crate.

pub mod loader;
pub mod orchestrator;
pub mod sdp;

pub use orchestrator::{DeviceSession, FlashError, Orchestrator, Phase};

/// How a session-ending command concluded.
///
/// jump-address and reset succeed by making the device drop off the bus,
/// usually before a response arrives. That disconnect is success, not
/// failure, and gets its own variant so the distinction stays visible in
/// the state machine instead of being papered over in error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The device answered before going away.
    Acknowledged,
    /// The session ended while the response was pending.
    ExpectedDisconnect,
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use ntflash_core::command::{status, Command, Reply};
    use ntflash_core::error::{ConnectError, TransportError};
    use ntflash_core::port::{CommandPort, PortFactory, SegmentFn};
    use ntflash_core::progress::{EventSink, ProgressEvent, Stage};
    use ntflash_core::{LOADER_PID, LOADER_VID, SDP_PID, SDP_VID};

    pub type Journal = Arc<Mutex<Vec<String>>>;

    /// One scripted reaction to an executed command.
    #[derive(Debug, Clone)]
    pub enum Step {
        Reply(Reply),
        Disconnect,
    }

    impl Step {
        pub fn ok() -> Self {
            Step::Reply(Reply::new(status::SUCCESS, vec![status::SUCCESS]))
        }

        pub fn silent() -> Self {
            Step::Reply(Reply::no_response())
        }

        pub fn failed(code: u32) -> Self {
            Step::Reply(Reply::new(code, vec![code]))
        }
    }

    /// Port that plays back a script; commands beyond the script succeed.
    #[derive(Debug)]
    pub struct ScriptedPort {
        steps: VecDeque<Step>,
        journal: Journal,
    }

    impl CommandPort for ScriptedPort {
        fn execute(
            &mut self,
            command: &Command<'_>,
            progress: Option<SegmentFn<'_>>,
        ) -> Result<Reply, TransportError> {
            self.journal.lock().unwrap().push(command.render());
            if let (Some(data), Some(callback)) = (command.data(), progress) {
                callback(data.len(), data.len());
            }
            match self.steps.pop_front() {
                None => Ok(Reply::new(status::SUCCESS, vec![status::SUCCESS])),
                Some(Step::Reply(reply)) => Ok(reply),
                Some(Step::Disconnect) => {
                    Err(TransportError::Disconnected("scripted".to_string()))
                }
            }
        }
    }

    /// Factory with a queue of scripted opens per identity. A queued `None`
    /// fails the open; an exhausted queue falls back to the per-identity
    /// default (itself `None` = keep failing).
    #[derive(Default)]
    pub struct ScriptedFactory {
        pub sdp_opens: VecDeque<Option<Vec<Step>>>,
        pub loader_opens: VecDeque<Option<Vec<Step>>>,
        pub sdp_default: Option<Vec<Step>>,
        pub loader_default: Option<Vec<Step>>,
        pub sdp_open_count: usize,
        pub loader_open_count: usize,
        pub journal: Journal,
    }

    impl ScriptedFactory {
        pub fn journal(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }

        fn port(&self, steps: Vec<Step>) -> ScriptedPort {
            ScriptedPort {
                steps: steps.into(),
                journal: Arc::clone(&self.journal),
            }
        }
    }

    impl PortFactory for ScriptedFactory {
        type Sdp = ScriptedPort;
        type Loader = ScriptedPort;

        fn open_sdp(&mut self) -> Result<ScriptedPort, ConnectError> {
            self.sdp_open_count += 1;
            let script = self
                .sdp_opens
                .pop_front()
                .unwrap_or_else(|| self.sdp_default.clone());
            match script {
                Some(steps) => Ok(self.port(steps)),
                None => Err(ConnectError::NotFound {
                    vid: SDP_VID,
                    pid: SDP_PID,
                }),
            }
        }

        fn open_loader(&mut self) -> Result<ScriptedPort, ConnectError> {
            self.loader_open_count += 1;
            let script = self
                .loader_opens
                .pop_front()
                .unwrap_or_else(|| self.loader_default.clone());
            match script {
                Some(steps) => Ok(self.port(steps)),
                None => Err(ConnectError::NotFound {
                    vid: LOADER_VID,
                    pid: LOADER_PID,
                }),
            }
        }
    }

    /// Sink that records every event for assertions.
    #[derive(Default)]
    pub struct CaptureSink {
        pub statuses: Vec<(Stage, u8)>,
        pub progresses: Vec<(Stage, u8)>,
    }

    impl EventSink for CaptureSink {
        fn status(&mut self, event: &ProgressEvent) {
            self.statuses.push((event.stage, event.percent));
        }

        fn progress(&mut self, event: &ProgressEvent) {
            self.progresses.push((event.stage, event.percent));
        }
    }
}
