//! The seam between orchestration and hardware
//!
//! A [`CommandPort`] is one open session with one device (ROM or
//! flashloader): send a typed command, get a [`Reply`]. A [`PortFactory`]
//! knows how to open those sessions; the orchestrator is generic over it, so
//! the same state machine runs against real USB hardware
//! (`ntflash-hid::UsbPortFactory`), the dry-run backend
//! (`ntflash-dummy::DryRunFactory`) or scripted test ports.

use crate::command::{Command, Reply};
use crate::error::{ConnectError, TransportError};

/// Segment-progress callback: `(bytes_transferred, bytes_total)`.
pub type SegmentFn<'a> = &'a mut dyn FnMut(usize, usize);

/// One open command/response session with a device.
///
/// Dropping the port releases the session; `execute` is strictly
/// synchronous, one command in flight at a time.
pub trait CommandPort {
    /// Send `command` and wait for its reply.
    ///
    /// Silence within the timeout window is not a transport error: the port
    /// returns a reply carrying [`status::NO_RESPONSE`] so controllers can
    /// interpret it per command. `Err` means the pipe itself failed.
    ///
    /// [`status::NO_RESPONSE`]: crate::command::status::NO_RESPONSE
    fn execute(
        &mut self,
        command: &Command<'_>,
        progress: Option<SegmentFn<'_>>,
    ) -> Result<Reply, TransportError>;
}

/// Opens sessions to the two USB identities the flasher talks to.
pub trait PortFactory {
    type Sdp: CommandPort;
    type Loader: CommandPort;

    /// Open a session to the ROM bootloader (SDP mode).
    fn open_sdp(&mut self) -> Result<Self::Sdp, ConnectError>;

    /// Open a session to the RAM-resident flashloader.
    fn open_loader(&mut self) -> Result<Self::Loader, ConnectError>;

    /// Drop any cached bus state so the next open sees a freshly enumerated
    /// device list. Called once after the SDP jump.
    fn invalidate(&mut self) {}
}
