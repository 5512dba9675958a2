//! Error taxonomy for device interaction
//!
//! Three layers, matching how failures surface:
//! - [`TransportError`]: the USB pipe itself broke or stayed silent.
//! - [`ConnectError`]: a device could not be opened or probed.
//! - [`CommandError`]: the device answered a specific command with a failure
//!   or not at all.
//!
//! Package validation errors live in `ntflash-package`; the orchestrator's
//! per-phase error lives in `ntflash-device`.

use thiserror::Error;

/// Failures of the transport pipe, independent of any particular command.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device dropped off the bus. Expected after jump-address and
    /// reset; fatal anywhere else.
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// A transfer failed for a reason other than disconnection.
    #[error("USB transfer failed: {0}")]
    Io(String),

    /// Nothing came back within the per-command timeout.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The command verb is not part of this device's protocol. Reaching this
    /// is a bug in the phase controllers.
    #[error("command {0} is not understood by this device")]
    Unsupported(&'static str),
}

/// Failures to establish a session with a device.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no USB device {vid:04x}:{pid:04x} present")]
    NotFound { vid: u16, pid: u16 },

    #[error("failed to open USB device {vid:04x}:{pid:04x}: {reason}")]
    OpenFailed { vid: u16, pid: u16, reason: String },

    /// The device enumerated and opened but did not answer the probe
    /// command.
    #[error("device opened but did not answer the probe")]
    ProbeSilent,
}

/// A specific command was sent and did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no response to {verb}")]
    Timeout { verb: &'static str },

    #[error("{verb} failed with status {status} (0x{status:08X})")]
    Failed { verb: &'static str, status: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
