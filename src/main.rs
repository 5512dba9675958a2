//! ntflash - Disting NT firmware flasher
//!
//! Flashes an Expert Sleepers disting NT (i.MX RT1060) over USB in two
//! stages: the ROM's Serial Download Protocol loads a RAM-resident
//! flashloader, then the flashloader erases and programs the FlexSPI NOR
//! flash. Firmware comes from a local ZIP package or is downloaded from the
//! Expert Sleepers site.
//!
//! # Architecture
//!
//! The binary only parses arguments, resolves the firmware source and
//! presents progress. Everything else lives in the workspace crates:
//! `ntflash-package` validates the archive, `ntflash-device` runs the flash
//! state machine, and the machine is generic over a `PortFactory` so it runs
//! identically against real USB (`ntflash-hid`) and the dry-run backend
//! (`ntflash-dummy`).

mod cli;
mod download;
mod output;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cli::Cli;
use ntflash_core::config::FlashConfig;
use ntflash_device::{FlashError, Orchestrator};
use ntflash_dummy::DryRunFactory;
use ntflash_hid::UsbPortFactory;
use ntflash_package::FirmwarePackage;
use output::Reporter;

fn main() {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = log_filter(cli.verbose) {
        logger.filter_level(level);
    }
    logger.init();

    let mut reporter = Reporter::new(cli.machine);
    if let Err(err) = run(cli, &mut reporter) {
        reporter.error(&err.to_string());
        if matches!(
            err.downcast_ref::<FlashError>(),
            Some(FlashError::DeviceNotFound)
        ) {
            reporter.note("Make sure disting NT is in bootloader mode:");
            reporter.note("  Menu > Misc > Enter bootloader mode...");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, reporter: &mut Reporter) -> Result<(), Box<dyn Error>> {
    if cli.list {
        // Informational text only; in machine mode the protocol stream
        // stays empty and the process just exits 0.
        reporter.note("Available firmware versions from Expert Sleepers:");
        reporter.note(&format!("  {}", download::FIRMWARE_PAGE_URL));
        reporter.note("");
        reporter.note(&format!(
            "Known versions: {}",
            download::KNOWN_VERSIONS.join(", ")
        ));
        return Ok(());
    }

    // Keep any download guard alive until the flash finishes; dropping it
    // deletes the temp file.
    let mut downloaded = None;
    let archive_path: PathBuf = if let Some(version) = requested_version(&cli) {
        reporter.note(&format!("Downloading firmware {}...", version));
        let guard = download::fetch(
            &download::version_url(&version),
            &format!("distingNT_{}.zip", version),
        )?;
        let path = guard.path().to_path_buf();
        downloaded = Some(guard);
        path
    } else if let Some(url) = &cli.url {
        let guard = download::fetch(url, "distingNT_download.zip")?;
        let path = guard.path().to_path_buf();
        downloaded = Some(guard);
        path
    } else if let Some(archive) = &cli.archive {
        archive.clone()
    } else {
        return Err(
            "no firmware source specified (give an archive path, --version, --latest or --url)"
                .into(),
        );
    };

    reporter.loading(&format!(
        "Loading firmware package: {}",
        archive_path.display()
    ));
    let bytes = fs::read(&archive_path)
        .map_err(|e| format!("cannot open {}: {}", archive_path.display(), e))?;
    let package = FirmwarePackage::from_archive(&bytes)?;
    reporter.note(&format!(
        "Firmware: {} ({} bytes)",
        package.firmware_entry(),
        package.firmware().len()
    ));

    let config = FlashConfig {
        dry_run: cli.dry_run,
        enumeration_delay: Duration::from_secs(cli.enum_wait),
        ..FlashConfig::default()
    };

    if cli.dry_run {
        reporter.note("[DRY RUN MODE - No actual flashing will occur]");
        Orchestrator::new(DryRunFactory::new(), config).flash(&package, reporter)?;
    } else {
        let factory = UsbPortFactory::new(config.clone());
        Orchestrator::new(factory, config).flash(&package, reporter)?;
    }

    drop(downloaded);
    Ok(())
}

fn requested_version(cli: &Cli) -> Option<String> {
    if cli.latest {
        Some(download::latest_version().to_string())
    } else {
        cli.version.clone()
    }
}

/// Map `-v` counts onto a logger filter; `None` keeps the RUST_LOG /
/// default-warn behavior.
fn log_filter(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use output::testutil::SharedBuffer;
    use output::MachineReporter;

    #[test]
    fn verbosity_raises_the_logger_filter() {
        assert_eq!(log_filter(0), None);
        assert_eq!(log_filter(1), Some(log::LevelFilter::Debug));
        assert_eq!(log_filter(2), Some(log::LevelFilter::Trace));
        assert_eq!(log_filter(7), Some(log::LevelFilter::Trace));
    }

    #[test]
    fn list_emits_nothing_on_the_machine_stream() {
        let cli = Cli::try_parse_from(["ntflash", "--list", "--machine"]).unwrap();
        let buffer = SharedBuffer::default();
        let mut reporter = Reporter::Machine(MachineReporter::new(Box::new(buffer.clone())));

        run(cli, &mut reporter).unwrap();
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn latest_resolves_to_the_newest_known_version() {
        let cli = Cli::try_parse_from(["ntflash", "--latest"]).unwrap();
        assert_eq!(
            requested_version(&cli).as_deref(),
            Some(download::latest_version())
        );
        let cli = Cli::try_parse_from(["ntflash", "--version", "1.9.0"]).unwrap();
        assert_eq!(requested_version(&cli).as_deref(), Some("1.9.0"));
    }
}
