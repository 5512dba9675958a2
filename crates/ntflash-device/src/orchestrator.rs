//! The flash state machine.
//!
//! One linear pass: find the device (ROM first, falling back to an
//! already-running flashloader), stage the flashloader over SDP, ride out
//! the re-enumeration, then configure, erase, write and reset over the
//! blhost session. Progress events fire at every stage boundary so the
//! embedding tool always knows where a run died.

use std::thread;

use ntflash_core::config::FlashConfig;
use ntflash_core::error::{CommandError, ConnectError};
use ntflash_core::port::PortFactory;
use ntflash_core::progress::{EventSink, ProgressModel, Stage};
use ntflash_core::{
    CONFIG_ADDR, FCB_CONFIG, FIRMWARE_ADDR, FLASHLOADER_ADDR, FLASH_BASE, FLEXSPI_NOR_CONFIG,
    MEMORY_ID_FLEXSPI_NOR,
};
use ntflash_package::FirmwarePackage;
use thiserror::Error;

use crate::loader::LoaderPhase;
use crate::sdp::SdpPhase;

/// Where a run currently is. Mirrors the progress stages but tracks the
/// machine's own position, including the terminal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    SdpConnect,
    SdpUpload,
    SdpJump,
    AwaitEnumeration,
    BootloaderConnect,
    Configure,
    Erase,
    WriteFcb,
    WriteFirmware,
    Reset,
    Complete,
    Failed,
}

/// Per-run state. Created fresh by [`Orchestrator::new`]; nothing survives
/// into the next run.
#[derive(Debug)]
pub struct DeviceSession {
    phase: Phase,
    skip_sdp: bool,
}

impl DeviceSession {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True when the device was already in flashloader mode and the whole
    /// SDP stage was bypassed.
    pub fn skipped_sdp(&self) -> bool {
        self.skip_sdp
    }
}

/// Why a run failed, by stage.
#[derive(Debug, Error)]
pub enum FlashError {
    #[error("no device found; connect the module in bootloader mode and try again")]
    DeviceNotFound,

    #[error("flashloader upload failed")]
    Upload(#[source] CommandError),

    #[error("flashloader did not come up after {attempts} connection attempts")]
    BootloaderUnavailable {
        attempts: u32,
        #[source]
        source: ConnectError,
    },

    #[error("FlexSPI NOR configuration failed")]
    Configure(#[source] CommandError),

    #[error("flash erase failed")]
    Erase(#[source] CommandError),

    #[error("flash config block programming failed")]
    Fcb(#[source] CommandError),

    #[error("firmware write failed")]
    Write(#[source] CommandError),
}

/// Drives one complete flash run over any [`PortFactory`].
pub struct Orchestrator<F: PortFactory> {
    factory: F,
    config: FlashConfig,
    session: DeviceSession,
}

impl<F: PortFactory> Orchestrator<F> {
    pub fn new(factory: F, config: FlashConfig) -> Self {
        Self {
            factory,
            config,
            session: DeviceSession {
                phase: Phase::Init,
                skip_sdp: false,
            },
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Run the full sequence for `package`, reporting into `sink`.
    pub fn flash(
        &mut self,
        package: &FirmwarePackage,
        sink: &mut dyn EventSink,
    ) -> Result<(), FlashError> {
        let mut progress = ProgressModel::new(sink);
        let result = self.run(package, &mut progress);
        match &result {
            Ok(()) => {
                self.session.phase = Phase::Complete;
                progress.enter(Stage::Complete, "Flash complete");
            }
            Err(err) => {
                self.session.phase = Phase::Failed;
                log::error!("flash failed during {:?}: {}", progress.stage(), err);
            }
        }
        result
    }

    fn run(
        &mut self,
        package: &FirmwarePackage,
        progress: &mut ProgressModel<'_>,
    ) -> Result<(), FlashError> {
        progress.enter(Stage::Start, "Starting flash sequence");

        self.session.phase = Phase::SdpConnect;
        progress.enter(Stage::SdpConnect, "Connecting to SDP bootloader");
        let sdp = match SdpPhase::connect(&mut self.factory) {
            Ok(sdp) => Some(sdp),
            Err(err) => {
                // No ROM device. The module may already be running the
                // flashloader from an earlier, interrupted run.
                log::debug!("SDP connect failed: {}", err);
                progress.enter(Stage::BlCheck, "Checking for a running flashloader");
                match LoaderPhase::probe(&mut self.factory) {
                    Ok(_) => {
                        self.session.skip_sdp = true;
                        progress.enter(Stage::BlFound, "Flashloader already running");
                        None
                    }
                    Err(probe_err) => {
                        log::debug!("flashloader probe failed: {}", probe_err);
                        return Err(FlashError::DeviceNotFound);
                    }
                }
            }
        };

        if let Some(mut sdp) = sdp {
            self.session.phase = Phase::SdpUpload;
            progress.enter(Stage::SdpUpload, "Uploading flashloader to RAM");
            sdp.upload_flashloader(FLASHLOADER_ADDR, package.flashloader(), progress)
                .map_err(FlashError::Upload)?;

            self.session.phase = Phase::SdpJump;
            progress.enter(Stage::SdpJump, "Starting flashloader");
            // Either completion means the ROM handed control over.
            let _ = sdp.jump(FLASHLOADER_ADDR);

            self.session.phase = Phase::AwaitEnumeration;
            progress.enter(Stage::WaitEnum, "Waiting for flashloader to enumerate");
            if !self.config.dry_run {
                thread::sleep(self.config.enumeration_delay);
            }
        }

        // The bus changed under us either way; rescan before connecting.
        self.factory.invalidate();

        self.session.phase = Phase::BootloaderConnect;
        progress.enter(Stage::BlConnect, "Connecting to flashloader");
        let attempts = self.config.connect_attempts.max(1);
        let mut loader = LoaderPhase::connect(&mut self.factory, &self.config)
            .map_err(|source| FlashError::BootloaderUnavailable { attempts, source })?;

        self.session.phase = Phase::Configure;
        progress.enter(Stage::Configure, "Configuring FlexSPI NOR interface");
        loader
            .fill_memory(CONFIG_ADDR, 4, FLEXSPI_NOR_CONFIG)
            .and_then(|_| loader.configure_memory(MEMORY_ID_FLEXSPI_NOR, CONFIG_ADDR))
            .map_err(FlashError::Configure)?;

        self.session.phase = Phase::Erase;
        progress.enter(Stage::Erase, "Erasing flash");
        loader
            .erase_region(FLASH_BASE, package.erase_size(), 0)
            .map_err(FlashError::Erase)?;

        self.session.phase = Phase::WriteFcb;
        progress.enter(Stage::Fcb, "Programming flash config block");
        loader
            .fill_memory(CONFIG_ADDR, 4, FCB_CONFIG)
            .and_then(|_| loader.configure_memory(MEMORY_ID_FLEXSPI_NOR, CONFIG_ADDR))
            .map_err(FlashError::Fcb)?;

        self.session.phase = Phase::WriteFirmware;
        progress.enter(Stage::Write, "Writing firmware");
        loader
            .write_memory(FIRMWARE_ADDR, package.firmware(), 0, progress)
            .map_err(FlashError::Write)?;

        self.session.phase = Phase::Reset;
        progress.enter(Stage::Reset, "Resetting device");
        // Success or disconnect, the firmware is on flash either way.
        let _ = loader.reset();

        Ok(())
    }
}
