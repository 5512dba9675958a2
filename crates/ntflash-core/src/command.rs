//! Typed SDP and flashloader commands
//!
//! The NXP host tools dispatch commands by verb string ("fill-memory",
//! "write-file", ...). Here the set is closed: one variant per verb the
//! flasher actually uses, so a bad verb is unrepresentable. Payload-carrying
//! variants borrow their data; nothing in the command layer copies images.

/// Status words shared by the SDP and flashloader response paths.
///
/// 10003/10004 match the values the NXP host library synthesizes for
/// "nothing came back" and "nothing was supposed to come back".
pub mod status {
    pub const SUCCESS: u32 = 0;
    pub const NO_RESPONSE: u32 = 10003;
    pub const NO_RESPONSE_EXPECTED: u32 = 10004;
}

/// A single command for either the ROM (SDP) or the flashloader.
///
/// `ErrorStatus`, `WriteFile` and `JumpAddress` are SDP verbs; the rest are
/// flashloader verbs. A port is only ever handed the verbs its device
/// understands.
#[derive(Debug)]
pub enum Command<'a> {
    /// SDP probe: ask the ROM for its global error status.
    ErrorStatus,
    /// SDP: stream an image into RAM at `address`.
    WriteFile { address: u32, data: &'a [u8] },
    /// SDP: start executing at `address`. The device drops off the bus on
    /// success.
    JumpAddress { address: u32 },
    /// Flashloader probe: read a property (tag 1 = current version).
    GetProperty { tag: u32 },
    /// Fill a RAM region with a repeated 32-bit pattern.
    FillMemory {
        address: u32,
        byte_count: u32,
        pattern: u32,
    },
    /// Run the memory-interface configuration staged at `config_address`.
    ConfigureMemory { memory_id: u32, config_address: u32 },
    /// Erase `byte_count` bytes of flash starting at `address`.
    FlashEraseRegion {
        address: u32,
        byte_count: u32,
        memory_id: u32,
    },
    /// Write an image to flash at `address`.
    WriteMemory {
        address: u32,
        data: &'a [u8],
        memory_id: u32,
    },
    /// Reset the device. The device drops off the bus before answering.
    Reset,
}

impl Command<'_> {
    /// The verb as the NXP host tools would spell it.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::ErrorStatus => "error-status",
            Command::WriteFile { .. } => "write-file",
            Command::JumpAddress { .. } => "jump-address",
            Command::GetProperty { .. } => "get-property",
            Command::FillMemory { .. } => "fill-memory",
            Command::ConfigureMemory { .. } => "configure-memory",
            Command::FlashEraseRegion { .. } => "flash-erase-region",
            Command::WriteMemory { .. } => "write-memory",
            Command::Reset => "reset",
        }
    }

    /// Payload for commands with a data phase.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Command::WriteFile { data, .. } | Command::WriteMemory { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Render the command the way it would appear on a blhost/sdphost
    /// command line. Used for logging and the dry-run journal.
    pub fn render(&self) -> String {
        match self {
            Command::ErrorStatus => "error-status".to_string(),
            Command::WriteFile { address, data } => {
                format!("write-file 0x{:X} <{} bytes>", address, data.len())
            }
            Command::JumpAddress { address } => format!("jump-address 0x{:X}", address),
            Command::GetProperty { tag } => format!("get-property {}", tag),
            Command::FillMemory {
                address,
                byte_count,
                pattern,
            } => format!("fill-memory 0x{:X} {} 0x{:X} word", address, byte_count, pattern),
            Command::ConfigureMemory {
                memory_id,
                config_address,
            } => format!("configure-memory {} 0x{:X}", memory_id, config_address),
            Command::FlashEraseRegion {
                address,
                byte_count,
                memory_id,
            } => format!("flash-erase-region 0x{:X} {} {}", address, byte_count, memory_id),
            Command::WriteMemory {
                address,
                data,
                memory_id,
            } => format!("write-memory 0x{:X} <{} bytes> {}", address, data.len(), memory_id),
            Command::Reset => "reset".to_string(),
        }
    }
}

/// What came back from the device for one command.
///
/// `status` is the first response word; on timeout the transport synthesizes
/// [`status::NO_RESPONSE`] so the controllers can treat silence uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u32,
    pub values: Vec<u32>,
}

impl Reply {
    pub fn new(status: u32, values: Vec<u32>) -> Self {
        Self { status, values }
    }

    pub fn success() -> Self {
        Self::new(status::SUCCESS, Vec::new())
    }

    pub fn no_response() -> Self {
        Self::new(status::NO_RESPONSE, Vec::new())
    }

    pub fn is_no_response(&self) -> bool {
        self.status == status::NO_RESPONSE
    }
}
