//! First stage: the ROM bootloader's Serial Download Protocol.
//!
//! The ROM only needs to do three things for us: prove it is alive, accept
//! the flashloader image into RAM, and jump to it. Each maps to one SDP
//! verb; everything else the protocol offers is out of scope here.

use ntflash_core::command::{status, Command};
use ntflash_core::error::{CommandError, ConnectError};
use ntflash_core::port::{CommandPort, PortFactory};
use ntflash_core::progress::ProgressModel;

use crate::Completion;

/// An open SDP session with the ROM bootloader.
pub struct SdpPhase<P: CommandPort> {
    port: P,
}

impl<P: CommandPort> SdpPhase<P> {
    /// Open the ROM device and probe it with error-status.
    ///
    /// A device that enumerates but stays silent is not connected: the
    /// probe has to come back before we trust the session enough to stream
    /// an image over it.
    pub fn connect<F>(factory: &mut F) -> Result<Self, ConnectError>
    where
        F: PortFactory<Sdp = P>,
    {
        let mut port = factory.open_sdp()?;
        let reply = port
            .execute(&Command::ErrorStatus, None)
            .map_err(|_| ConnectError::ProbeSilent)?;
        if reply.is_no_response() {
            return Err(ConnectError::ProbeSilent);
        }
        log::debug!("SDP probe answered with status 0x{:08X}", reply.status);
        Ok(Self { port })
    }

    /// Stream the flashloader image into RAM at `address`.
    pub fn upload_flashloader(
        &mut self,
        address: u32,
        image: &[u8],
        progress: &mut ProgressModel<'_>,
    ) -> Result<(), CommandError> {
        let command = Command::WriteFile {
            address,
            data: image,
        };
        let verb = command.verb();
        let mut on_segment = |current: usize, total: usize| progress.segment(current, total);
        let reply = self.port.execute(&command, Some(&mut on_segment))?;
        if reply.is_no_response() {
            return Err(CommandError::Timeout { verb });
        }
        if reply.status != status::SUCCESS {
            return Err(CommandError::Failed {
                verb,
                status: reply.status,
            });
        }
        log::info!("uploaded {} bytes to 0x{:08X}", image.len(), address);
        Ok(())
    }

    /// Jump to `address`, handing the device over to the flashloader.
    ///
    /// Consumes the phase: once the jump is issued the ROM session is gone
    /// whether or not a response made it back.
    pub fn jump(mut self, address: u32) -> Completion {
        match self.port.execute(&Command::JumpAddress { address }, None) {
            Ok(_) => Completion::Acknowledged,
            Err(err) => {
                log::debug!("jump-address ended the session: {}", err);
                Completion::ExpectedDisconnect
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CaptureSink, ScriptedFactory, Step};
    use ntflash_core::progress::Stage;

    #[test]
    fn connect_probes_with_error_status() {
        let mut factory = ScriptedFactory::default();
        factory.sdp_opens.push_back(Some(vec![Step::ok()]));

        let phase = SdpPhase::connect(&mut factory);
        assert!(phase.is_ok());
        assert_eq!(factory.journal(), vec!["error-status"]);
    }

    #[test]
    fn silent_probe_is_not_a_connection() {
        let mut factory = ScriptedFactory::default();
        factory.sdp_opens.push_back(Some(vec![Step::silent()]));

        assert!(matches!(
            SdpPhase::connect(&mut factory),
            Err(ConnectError::ProbeSilent)
        ));
    }

    #[test]
    fn absent_device_is_reported_as_not_found() {
        let mut factory = ScriptedFactory::default();
        factory.sdp_opens.push_back(None);

        assert!(matches!(
            SdpPhase::connect(&mut factory),
            Err(ConnectError::NotFound { .. })
        ));
    }

    #[test]
    fn upload_timeout_surfaces_as_command_timeout() {
        let mut factory = ScriptedFactory::default();
        factory
            .sdp_opens
            .push_back(Some(vec![Step::ok(), Step::silent()]));

        let mut phase = SdpPhase::connect(&mut factory).unwrap();
        let mut sink = CaptureSink::default();
        let mut model = ProgressModel::new(&mut sink);
        model.enter(Stage::SdpUpload, "Uploading flashloader");

        let err = phase
            .upload_flashloader(0x2000_1C00, &[0u8; 64], &mut model)
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Timeout { verb: "write-file" }
        ));
    }

    #[test]
    fn jump_disconnect_is_the_expected_outcome() {
        let mut factory = ScriptedFactory::default();
        factory
            .sdp_opens
            .push_back(Some(vec![Step::ok(), Step::Disconnect]));

        let phase = SdpPhase::connect(&mut factory).unwrap();
        assert_eq!(phase.jump(0x2000_1C00), Completion::ExpectedDisconnect);
    }

    #[test]
    fn jump_can_also_be_acknowledged() {
        let mut factory = ScriptedFactory::default();
        factory
            .sdp_opens
            .push_back(Some(vec![Step::ok(), Step::ok()]));

        let phase = SdpPhase::connect(&mut factory).unwrap();
        assert_eq!(phase.jump(0x2000_1C00), Completion::Acknowledged);
    }
}
