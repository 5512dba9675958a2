//! Raw HID access over rusb.
//!
//! Both bootloader identities are plain HID devices with one interface and
//! one interrupt IN endpoint. Reports go out as class-level SET_REPORT
//! control transfers and come back over the interrupt endpoint, which is
//! what the NXP host tools do as well.

use std::time::Duration;

use ntflash_core::error::{ConnectError, TransportError};
use rusb::{DeviceHandle, GlobalContext};

const HID_INTERFACE: u8 = 0;
const INTERRUPT_IN_EP: u8 = 0x81;

/// bmRequestType for a class request to an interface, host-to-device.
const SET_REPORT_REQUEST_TYPE: u8 = 0x21;
/// HID SET_REPORT bRequest.
const SET_REPORT: u8 = 0x09;
/// wValue report type for an output report (high byte).
const REPORT_TYPE_OUTPUT: u16 = 0x0200;

/// One open HID device.
pub struct HidDevice {
    handle: DeviceHandle<GlobalContext>,
}

impl HidDevice {
    /// Find and claim the first device matching `vid:pid`.
    pub fn open(vid: u16, pid: u16) -> Result<Self, ConnectError> {
        let devices = rusb::devices().map_err(|e| ConnectError::OpenFailed {
            vid,
            pid,
            reason: format!("USB enumeration failed: {}", e),
        })?;

        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if descriptor.vendor_id() != vid || descriptor.product_id() != pid {
                continue;
            }

            let mut handle = device.open().map_err(|e| ConnectError::OpenFailed {
                vid,
                pid,
                reason: e.to_string(),
            })?;
            // The kernel's hid driver grabs these devices on Linux.
            let _ = handle.set_auto_detach_kernel_driver(true);
            handle
                .claim_interface(HID_INTERFACE)
                .map_err(|e| ConnectError::OpenFailed {
                    vid,
                    pid,
                    reason: format!("claim interface failed: {}", e),
                })?;

            log::debug!("opened HID device {:04x}:{:04x}", vid, pid);
            return Ok(Self { handle });
        }

        Err(ConnectError::NotFound { vid, pid })
    }

    /// Send one output report. `payload` must already start with the report
    /// id byte.
    pub fn write_report(&mut self, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let report_id = payload.first().copied().unwrap_or(0);
        self.handle
            .write_control(
                SET_REPORT_REQUEST_TYPE,
                SET_REPORT,
                REPORT_TYPE_OUTPUT | report_id as u16,
                HID_INTERFACE as u16,
                payload,
                timeout,
            )
            .map_err(map_rusb_error)?;
        Ok(())
    }

    /// Read one input report from the interrupt endpoint.
    ///
    /// Returns the report id and its payload, or `None` on timeout so the
    /// ports can synthesize a no-response status.
    pub fn read_report(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(u8, Vec<u8>)>, TransportError> {
        let mut buf = [0u8; 1024 + 1];
        let read = match self.handle.read_interrupt(INTERRUPT_IN_EP, &mut buf, timeout) {
            Ok(n) => n,
            Err(rusb::Error::Timeout) => return Ok(None),
            Err(e) => return Err(map_rusb_error(e)),
        };
        if read == 0 {
            return Ok(None);
        }
        Ok(Some((buf[0], buf[1..read].to_vec())))
    }
}

impl Drop for HidDevice {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(HID_INTERFACE);
    }
}

fn map_rusb_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::NoDevice | rusb::Error::Pipe | rusb::Error::Io => {
            TransportError::Disconnected(err.to_string())
        }
        rusb::Error::Timeout => TransportError::Timeout,
        other => TransportError::Io(other.to_string()),
    }
}
