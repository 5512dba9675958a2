//! ntflash-core - shared vocabulary for the disting NT USB flasher
//!
//! This crate holds everything the orchestration layer and the hardware
//! backends need to agree on: device constants, the closed set of typed
//! commands, the `CommandPort`/`PortFactory` seam, the error taxonomy, the
//! run configuration and the progress/event model. It never talks USB
//! itself; backends live in `ntflash-hid` (real hardware) and
//! `ntflash-dummy` (dry-run/testing).

pub mod command;
pub mod config;
pub mod error;
pub mod port;
pub mod progress;

pub use command::{status, Command, Reply};
pub use config::FlashConfig;
pub use error::{CommandError, ConnectError, TransportError};
pub use port::{CommandPort, PortFactory, SegmentFn};
pub use progress::{EventSink, ProgressEvent, ProgressModel, Stage};

/// USB identity of the i.MX RT ROM bootloader (SDP mode).
pub const SDP_VID: u16 = 0x1FC9;
pub const SDP_PID: u16 = 0x0135;

/// USB identity of the RAM-resident flashloader once it is running.
pub const LOADER_VID: u16 = 0x15A2;
pub const LOADER_PID: u16 = 0x0073;

/// RAM address the flashloader image is uploaded to and jumped to.
pub const FLASHLOADER_ADDR: u32 = 0x2000_1C00;

/// Base address of the external FlexSPI NOR flash.
pub const FLASH_BASE: u32 = 0x6000_0000;

/// Address the application firmware is written to (flash base + FCB area).
pub const FIRMWARE_ADDR: u32 = 0x6000_1000;

/// Scratch RAM address used to stage memory configuration words.
pub const CONFIG_ADDR: u32 = 0x2000;

/// FlexSPI NOR option word staged before `configure-memory`.
pub const FLEXSPI_NOR_CONFIG: u32 = 0xC000_0008;

/// Option word that makes `configure-memory` program the FCB.
pub const FCB_CONFIG: u32 = 0xF000_000F;

/// blhost memory id for external FlexSPI NOR.
pub const MEMORY_ID_FLEXSPI_NOR: u32 = 9;

/// Gap between the flash base and the firmware image, occupied by the FCB.
/// The erase region is always firmware length plus this header; the device's
/// flash layout depends on the exact value, so it is kept literal.
pub const FIRMWARE_HEADER_SIZE: u32 = 0x1000;
