//! Second stage: the RAM-resident flashloader.
//!
//! After the SDP jump the chip re-enumerates under a new USB identity and
//! speaks the blhost command set. [`LoaderPhase`] wraps one such session and
//! exposes exactly the verbs the flash sequence needs, with the status-word
//! interpretation in one place.

use std::thread;

use ntflash_core::command::{status, Command, Reply};
use ntflash_core::config::FlashConfig;
use ntflash_core::error::{CommandError, ConnectError};
use ntflash_core::port::{CommandPort, PortFactory};
use ntflash_core::progress::ProgressModel;

use crate::Completion;

/// get-property tag for the flashloader's version. Any successful answer
/// proves the loader is up; the value itself is only logged.
const PROPERTY_CURRENT_VERSION: u32 = 1;

/// An open session with the flashloader.
#[derive(Debug)]
pub struct LoaderPhase<P: CommandPort> {
    port: P,
}

impl<P: CommandPort> LoaderPhase<P> {
    /// Single connection attempt: open the device and read its version.
    pub fn probe<F>(factory: &mut F) -> Result<Self, ConnectError>
    where
        F: PortFactory<Loader = P>,
    {
        let mut port = factory.open_loader()?;
        let reply = port
            .execute(
                &Command::GetProperty {
                    tag: PROPERTY_CURRENT_VERSION,
                },
                None,
            )
            .map_err(|_| ConnectError::ProbeSilent)?;
        if reply.is_no_response() {
            return Err(ConnectError::ProbeSilent);
        }
        if let Some(version) = reply.values.first() {
            log::debug!("flashloader version word 0x{:08X}", version);
        }
        Ok(Self { port })
    }

    /// Connect with retries. The loader takes a moment to enumerate after
    /// the jump, so failed attempts are expected early on; only the last
    /// failure is reported.
    pub fn connect<F>(factory: &mut F, config: &FlashConfig) -> Result<Self, ConnectError>
    where
        F: PortFactory<Loader = P>,
    {
        let attempts = config.connect_attempts.max(1);
        let mut last = ConnectError::ProbeSilent;
        for attempt in 1..=attempts {
            match Self::probe(factory) {
                Ok(phase) => {
                    log::info!("flashloader connected on attempt {}/{}", attempt, attempts);
                    return Ok(phase);
                }
                Err(err) => {
                    log::debug!("connect attempt {}/{} failed: {}", attempt, attempts, err);
                    last = err;
                }
            }
            if attempt < attempts {
                thread::sleep(config.connect_retry_delay);
            }
        }
        Err(last)
    }

    /// Execute one command and fold the status word into a result.
    fn run(&mut self, command: &Command<'_>, progress: Option<&mut ProgressModel<'_>>) -> Result<Reply, CommandError> {
        let verb = command.verb();
        let reply = match progress {
            Some(model) => {
                let mut on_segment =
                    |current: usize, total: usize| model.segment(current, total);
                self.port.execute(command, Some(&mut on_segment))?
            }
            None => self.port.execute(command, None)?,
        };
        match reply.status {
            status::SUCCESS | status::NO_RESPONSE_EXPECTED => Ok(reply),
            status::NO_RESPONSE => Err(CommandError::Timeout { verb }),
            other => Err(CommandError::Failed {
                verb,
                status: other,
            }),
        }
    }

    /// Stage a 32-bit pattern in device RAM.
    pub fn fill_memory(
        &mut self,
        address: u32,
        byte_count: u32,
        pattern: u32,
    ) -> Result<(), CommandError> {
        self.run(
            &Command::FillMemory {
                address,
                byte_count,
                pattern,
            },
            None,
        )
        .map(|_| ())
    }

    /// Apply the memory configuration staged at `config_address`.
    pub fn configure_memory(
        &mut self,
        memory_id: u32,
        config_address: u32,
    ) -> Result<(), CommandError> {
        self.run(
            &Command::ConfigureMemory {
                memory_id,
                config_address,
            },
            None,
        )
        .map(|_| ())
    }

    /// Erase `byte_count` bytes of flash starting at `address`.
    pub fn erase_region(
        &mut self,
        address: u32,
        byte_count: u32,
        memory_id: u32,
    ) -> Result<(), CommandError> {
        self.run(
            &Command::FlashEraseRegion {
                address,
                byte_count,
                memory_id,
            },
            None,
        )
        .map(|_| ())
    }

    /// Stream `data` into flash at `address`.
    pub fn write_memory(
        &mut self,
        address: u32,
        data: &[u8],
        memory_id: u32,
        progress: &mut ProgressModel<'_>,
    ) -> Result<(), CommandError> {
        self.run(
            &Command::WriteMemory {
                address,
                data,
                memory_id,
            },
            Some(progress),
        )
        .map(|_| ())
    }

    /// Reset the device into the freshly written firmware.
    ///
    /// Consumes the phase. Silence and disconnection both mean the reset
    /// took; an explicit failure status is logged but does not fail the run,
    /// since by this point the flash contents are already correct.
    pub fn reset(mut self) -> Completion {
        match self.run(&Command::Reset, None) {
            Ok(_) => Completion::Acknowledged,
            Err(CommandError::Failed { status, .. }) => {
                log::warn!("reset reported status {}; power-cycle if needed", status);
                Completion::Acknowledged
            }
            Err(err) => {
                log::debug!("reset ended the session: {}", err);
                Completion::ExpectedDisconnect
            }
        }
    }
}
