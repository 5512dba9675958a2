//! blhost packet framing for the flashloader.
//!
//! Each HID report carries a 2-byte little-endian length followed by one
//! framing packet: a 4-byte header {tag, flags, reserved, param count} and
//! the parameters as little-endian words. Report 1 carries commands out,
//! report 2 data out, report 3 responses in, report 4 data in.

use std::time::Duration;

use ntflash_core::command::{Command, Reply};
use ntflash_core::error::TransportError;
use ntflash_core::port::{CommandPort, SegmentFn};

use crate::device::HidDevice;

const REPORT_COMMAND_OUT: u8 = 1;
const REPORT_DATA_OUT: u8 = 2;
const REPORT_RESPONSE_IN: u8 = 3;

const TAG_FLASH_ERASE_REGION: u8 = 0x02;
const TAG_WRITE_MEMORY: u8 = 0x04;
const TAG_FILL_MEMORY: u8 = 0x05;
const TAG_GET_PROPERTY: u8 = 0x07;
const TAG_RESET: u8 = 0x0B;
const TAG_CONFIGURE_MEMORY: u8 = 0x11;

/// Command carries a data phase.
const FLAG_HAS_DATA: u8 = 0x01;

/// Data bytes per output report, matching the flashloader's report size.
const DATA_CHUNK: usize = 1016;

/// Serialize one framing packet into a report buffer.
fn encode_packet(report_id: u8, tag: u8, flags: u8, params: &[u32]) -> Vec<u8> {
    let packet_len = 4 + 4 * params.len();
    let mut buf = Vec::with_capacity(3 + packet_len);
    buf.push(report_id);
    buf.extend_from_slice(&(packet_len as u16).to_le_bytes());
    buf.push(tag);
    buf.push(flags);
    buf.push(0);
    buf.push(params.len() as u8);
    for param in params {
        buf.extend_from_slice(&param.to_le_bytes());
    }
    buf
}

/// Wrap raw data bytes into an output data report.
fn encode_data(chunk: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3 + chunk.len());
    buf.push(REPORT_DATA_OUT);
    buf.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
    buf.extend_from_slice(chunk);
    buf
}

/// Parse a response report payload (after the report id byte) into its
/// parameter words. The first parameter is the status word.
fn parse_response(payload: &[u8]) -> Option<Vec<u32>> {
    let length = u16::from_le_bytes(payload.get(..2)?.try_into().ok()?) as usize;
    let packet = payload.get(2..2 + length)?;
    let param_count = *packet.get(3)? as usize;
    let mut params = Vec::with_capacity(param_count);
    for i in 0..param_count {
        let offset = 4 + 4 * i;
        let bytes: [u8; 4] = packet.get(offset..offset + 4)?.try_into().ok()?;
        params.push(u32::from_le_bytes(bytes));
    }
    Some(params)
}

/// One open flashloader session over USB HID.
pub struct LoaderPort {
    device: HidDevice,
    timeout: Duration,
}

impl LoaderPort {
    pub fn new(device: HidDevice, timeout: Duration) -> Self {
        Self { device, timeout }
    }

    fn read_response(&mut self) -> Result<Reply, TransportError> {
        loop {
            let Some((id, payload)) = self.device.read_report(self.timeout)? else {
                return Ok(Reply::no_response());
            };
            if id != REPORT_RESPONSE_IN {
                log::trace!("skipping report {} while waiting for a response", id);
                continue;
            }
            let Some(params) = parse_response(&payload) else {
                return Err(TransportError::Io("malformed response packet".to_string()));
            };
            let mut params = params.into_iter();
            let Some(status) = params.next() else {
                return Err(TransportError::Io("response without status".to_string()));
            };
            return Ok(Reply::new(status, params.collect()));
        }
    }

    fn send_command(&mut self, tag: u8, flags: u8, params: &[u32]) -> Result<(), TransportError> {
        let report = encode_packet(REPORT_COMMAND_OUT, tag, flags, params);
        self.device.write_report(&report, self.timeout)
    }

    fn send_data(
        &mut self,
        data: &[u8],
        mut progress: Option<SegmentFn<'_>>,
    ) -> Result<(), TransportError> {
        let total = data.len();
        let mut sent = 0usize;
        for chunk in data.chunks(DATA_CHUNK) {
            let report = encode_data(chunk);
            self.device.write_report(&report, self.timeout)?;
            sent += chunk.len();
            if let Some(callback) = progress.as_mut() {
                callback(sent, total);
            }
        }
        Ok(())
    }
}

impl CommandPort for LoaderPort {
    fn execute(
        &mut self,
        command: &Command<'_>,
        progress: Option<SegmentFn<'_>>,
    ) -> Result<Reply, TransportError> {
        match command {
            Command::GetProperty { tag } => {
                self.send_command(TAG_GET_PROPERTY, 0, &[*tag])?;
                self.read_response()
            }
            Command::FillMemory {
                address,
                byte_count,
                pattern,
            } => {
                self.send_command(TAG_FILL_MEMORY, 0, &[*address, *byte_count, *pattern])?;
                self.read_response()
            }
            Command::ConfigureMemory {
                memory_id,
                config_address,
            } => {
                self.send_command(TAG_CONFIGURE_MEMORY, 0, &[*memory_id, *config_address])?;
                self.read_response()
            }
            Command::FlashEraseRegion {
                address,
                byte_count,
                memory_id,
            } => {
                self.send_command(
                    TAG_FLASH_ERASE_REGION,
                    0,
                    &[*address, *byte_count, *memory_id],
                )?;
                self.read_response()
            }
            Command::WriteMemory {
                address,
                data,
                memory_id,
            } => {
                self.send_command(
                    TAG_WRITE_MEMORY,
                    FLAG_HAS_DATA,
                    &[*address, data.len() as u32, *memory_id],
                )?;
                // The loader acknowledges the command before the data phase.
                let ack = self.read_response()?;
                if ack.is_no_response() {
                    return Ok(ack);
                }
                if ack.status != ntflash_core::command::status::SUCCESS {
                    return Ok(ack);
                }
                self.send_data(data, progress)?;
                self.read_response()
            }
            Command::Reset => {
                self.send_command(TAG_RESET, 0, &[])?;
                self.read_response()
            }
            other => Err(TransportError::Unsupported(other.verb())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_packet_layout_matches_the_wire_format() {
        let report = encode_packet(
            REPORT_COMMAND_OUT,
            TAG_FLASH_ERASE_REGION,
            0,
            &[0x6000_0000, 0x1B000, 0],
        );
        assert_eq!(report[0], 1);
        // Packet length: 4-byte header + 3 words.
        assert_eq!(&report[1..3], &16u16.to_le_bytes());
        assert_eq!(report[3], TAG_FLASH_ERASE_REGION);
        assert_eq!(report[4], 0);
        assert_eq!(report[5], 0);
        assert_eq!(report[6], 3);
        assert_eq!(&report[7..11], &0x6000_0000u32.to_le_bytes());
        assert_eq!(&report[11..15], &0x1B000u32.to_le_bytes());
        assert_eq!(&report[15..19], &0u32.to_le_bytes());
    }

    #[test]
    fn write_memory_flags_its_data_phase() {
        let report = encode_packet(
            REPORT_COMMAND_OUT,
            TAG_WRITE_MEMORY,
            FLAG_HAS_DATA,
            &[0x6000_1000, 1024, 0],
        );
        assert_eq!(report[3], TAG_WRITE_MEMORY);
        assert_eq!(report[4], FLAG_HAS_DATA);
    }

    #[test]
    fn data_report_is_length_prefixed() {
        let report = encode_data(&[0xAA; 5]);
        assert_eq!(report[0], REPORT_DATA_OUT);
        assert_eq!(&report[1..3], &5u16.to_le_bytes());
        assert_eq!(&report[3..], &[0xAA; 5]);
    }

    #[test]
    fn generic_response_parses_status_and_tag() {
        // GenericResponse: status 0, echoed command tag 0x02.
        let mut payload = Vec::new();
        payload.extend_from_slice(&12u16.to_le_bytes());
        payload.extend_from_slice(&[0xA0, 0, 0, 2]);
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&(TAG_FLASH_ERASE_REGION as u32).to_le_bytes());

        let params = parse_response(&payload).unwrap();
        assert_eq!(params, vec![0, TAG_FLASH_ERASE_REGION as u32]);
    }

    #[test]
    fn get_property_response_carries_the_value() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&12u16.to_le_bytes());
        payload.extend_from_slice(&[0xA7, 0, 0, 2]);
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&0x4B02_0D00u32.to_le_bytes());

        let params = parse_response(&payload).unwrap();
        assert_eq!(params[0], 0);
        assert_eq!(params[1], 0x4B02_0D00);
    }

    #[test]
    fn truncated_responses_are_rejected() {
        assert!(parse_response(&[]).is_none());
        assert!(parse_response(&[4, 0]).is_none());
        // Header promises two params but carries one.
        let mut payload = Vec::new();
        payload.extend_from_slice(&12u16.to_le_bytes());
        payload.extend_from_slice(&[0xA0, 0, 0, 2]);
        payload.extend_from_slice(&0u32.to_le_bytes());
        assert!(parse_response(&payload).is_none());
    }
}
