//! ntflash-hid - USB HID transport backend
//!
//! Implements [`ntflash_core::PortFactory`] against real hardware: the ROM
//! bootloader at 1fc9:0135 speaking SDP and the RAM flashloader at
//! 15a2:0073 speaking the blhost command set, both over USB HID via rusb.

pub mod blhost;
pub mod device;
pub mod sdp;

use ntflash_core::config::FlashConfig;
use ntflash_core::error::ConnectError;
use ntflash_core::port::PortFactory;
use ntflash_core::{LOADER_PID, LOADER_VID, SDP_PID, SDP_VID};

use blhost::LoaderPort;
use device::HidDevice;
use sdp::SdpPort;

/// Opens real USB sessions to the two bootloader identities.
pub struct UsbPortFactory {
    config: FlashConfig,
}

impl UsbPortFactory {
    pub fn new(config: FlashConfig) -> Self {
        Self { config }
    }
}

impl PortFactory for UsbPortFactory {
    type Sdp = SdpPort;
    type Loader = LoaderPort;

    fn open_sdp(&mut self) -> Result<SdpPort, ConnectError> {
        let device = HidDevice::open(SDP_VID, SDP_PID)?;
        Ok(SdpPort::new(device, self.config.sdp_timeout))
    }

    fn open_loader(&mut self) -> Result<LoaderPort, ConnectError> {
        let device = HidDevice::open(LOADER_VID, LOADER_PID)?;
        Ok(LoaderPort::new(device, self.config.loader_timeout))
    }

    fn invalidate(&mut self) {
        // rusb walks the device list fresh on every open; there is no
        // cached enumeration state to drop.
        log::debug!("bus rescan requested");
    }
}
