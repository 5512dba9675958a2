//! SDP report framing for the ROM bootloader.
//!
//! Every command is a 16-byte big-endian header in report 1. Image data
//! streams as report 2 in 1024-byte chunks. The ROM answers with a HAB mode
//! word in report 3 and, for most commands, a status word in report 4.

use std::time::Duration;

use ntflash_core::command::{status, Command, Reply};
use ntflash_core::error::TransportError;
use ntflash_core::port::{CommandPort, SegmentFn};

use crate::device::HidDevice;

const REPORT_COMMAND: u8 = 1;
const REPORT_DATA: u8 = 2;
const REPORT_HAB: u8 = 3;
const REPORT_STATUS: u8 = 4;

const DATA_CHUNK: usize = 1024;

const CMD_WRITE_FILE: u16 = 0x0404;
const CMD_ERROR_STATUS: u16 = 0x0505;
const CMD_JUMP_ADDRESS: u16 = 0x0B0B;

/// Status word the ROM sends after a completed write-file.
const WRITE_COMPLETE: u32 = 0x8888_8888;

/// How long to wait for the failure status after jump-address. Success
/// sends nothing, so this window stays short.
const JUMP_STATUS_WINDOW: Duration = Duration::from_millis(500);

/// Serialize one SDP command header.
///
/// Layout: type(u16) address(u32) format(u8) count(u32) data(u32)
/// reserved(u8), all multi-byte fields big-endian.
fn encode_header(command_type: u16, address: u32, format: u8, count: u32, data: u32) -> [u8; 17] {
    let mut buf = [0u8; 17];
    buf[0] = REPORT_COMMAND;
    buf[1..3].copy_from_slice(&command_type.to_be_bytes());
    buf[3..7].copy_from_slice(&address.to_be_bytes());
    buf[7] = format;
    buf[8..12].copy_from_slice(&count.to_be_bytes());
    buf[12..16].copy_from_slice(&data.to_be_bytes());
    buf
}

fn word(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// One open SDP session over USB HID.
pub struct SdpPort {
    device: HidDevice,
    timeout: Duration,
}

impl SdpPort {
    pub fn new(device: HidDevice, timeout: Duration) -> Self {
        Self { device, timeout }
    }

    /// Read one expected report, skipping reports of other ids. `None` on
    /// timeout.
    fn read_expected(&mut self, report_id: u8) -> Result<Option<u32>, TransportError> {
        loop {
            match self.device.read_report(self.timeout)? {
                None => return Ok(None),
                Some((id, payload)) if id == report_id => return Ok(word(&payload)),
                Some((id, _)) => {
                    log::trace!("skipping unexpected SDP report {}", id);
                }
            }
        }
    }

    /// Read the HAB report and the trailing status report.
    fn read_status(&mut self) -> Result<Reply, TransportError> {
        let Some(hab) = self.read_expected(REPORT_HAB)? else {
            return Ok(Reply::no_response());
        };
        log::trace!("HAB mode word 0x{:08X}", hab);
        match self.read_expected(REPORT_STATUS)? {
            None => Ok(Reply::no_response()),
            Some(code) => Ok(Reply::new(status::SUCCESS, vec![code])),
        }
    }

    fn write_file(
        &mut self,
        address: u32,
        data: &[u8],
        mut progress: Option<SegmentFn<'_>>,
    ) -> Result<Reply, TransportError> {
        let header = encode_header(CMD_WRITE_FILE, address, 0, data.len() as u32, 0);
        self.device.write_report(&header, self.timeout)?;

        let total = data.len();
        let mut sent = 0usize;
        for chunk in data.chunks(DATA_CHUNK) {
            let mut report = Vec::with_capacity(chunk.len() + 1);
            report.push(REPORT_DATA);
            report.extend_from_slice(chunk);
            self.device.write_report(&report, self.timeout)?;
            sent += chunk.len();
            if let Some(callback) = progress.as_mut() {
                callback(sent, total);
            }
        }

        let Some(hab) = self.read_expected(REPORT_HAB)? else {
            return Ok(Reply::no_response());
        };
        log::trace!("HAB mode word 0x{:08X}", hab);
        match self.read_expected(REPORT_STATUS)? {
            None => Ok(Reply::no_response()),
            Some(WRITE_COMPLETE) => Ok(Reply::new(status::SUCCESS, vec![WRITE_COMPLETE])),
            Some(code) => Ok(Reply::new(code, vec![code])),
        }
    }

    fn jump(&mut self, address: u32) -> Result<Reply, TransportError> {
        let header = encode_header(CMD_JUMP_ADDRESS, address, 0, 0, 0);
        self.device.write_report(&header, self.timeout)?;

        // Success jumps without a status report; only failures answer.
        if self.read_expected(REPORT_HAB)?.is_none() {
            return Ok(Reply::success());
        }
        let saved = self.timeout;
        self.timeout = JUMP_STATUS_WINDOW;
        let result = self.read_expected(REPORT_STATUS);
        self.timeout = saved;
        match result? {
            None => Ok(Reply::success()),
            Some(code) => Ok(Reply::new(code, vec![code])),
        }
    }
}

impl CommandPort for SdpPort {
    fn execute(
        &mut self,
        command: &Command<'_>,
        progress: Option<SegmentFn<'_>>,
    ) -> Result<Reply, TransportError> {
        match command {
            Command::ErrorStatus => {
                let header = encode_header(CMD_ERROR_STATUS, 0, 0, 0, 0);
                self.device.write_report(&header, self.timeout)?;
                self.read_status()
            }
            Command::WriteFile { address, data } => self.write_file(*address, data, progress),
            Command::JumpAddress { address } => self.jump(*address),
            other => Err(TransportError::Unsupported(other.verb())),
        }
    }
}
