//! Run configuration
//!
//! Carried explicitly into the orchestrator and port factories so that two
//! runs (say, a test and a dry-run) can never interfere through process
//! globals.

use std::time::Duration;

/// Tunables for one flash run.
#[derive(Debug, Clone)]
pub struct FlashConfig {
    /// Log intent instead of touching a device. The orchestrator also skips
    /// the re-enumeration wait, since there is no hardware to wait for.
    pub dry_run: bool,

    /// How long to wait for the flashloader to re-enumerate after the SDP
    /// jump. Empirically tuned per platform; override with `--enum-wait`.
    pub enumeration_delay: Duration,

    /// Bootloader connect attempts before giving up.
    pub connect_attempts: u32,

    /// Pause between bootloader connect attempts.
    pub connect_retry_delay: Duration,

    /// Per-command timeout for the ROM (SDP) session.
    pub sdp_timeout: Duration,

    /// Per-command timeout for the flashloader session. NOR erase is slow,
    /// so this is generous.
    pub loader_timeout: Duration,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            enumeration_delay: Duration::from_secs(5),
            connect_attempts: 5,
            connect_retry_delay: Duration::from_secs(1),
            sdp_timeout: Duration::from_secs(5),
            loader_timeout: Duration::from_secs(60),
        }
    }
}
