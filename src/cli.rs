//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ntflash")]
#[command(author, about = "Disting NT firmware flasher", long_about = None)]
#[command(disable_version_flag = true)]
#[command(after_help = "Before flashing, put the disting NT in bootloader mode:\n  \
                        Menu > Misc > Enter bootloader mode...")]
pub struct Cli {
    /// Local firmware package (ZIP) to flash
    pub archive: Option<PathBuf>,

    /// Download and flash a specific version
    #[arg(long, value_name = "X.Y.Z", conflicts_with = "archive")]
    pub version: Option<String>,

    /// Download and flash the latest known version
    #[arg(long, conflicts_with_all = ["archive", "version", "url"])]
    pub latest: bool,

    /// Download and flash from an arbitrary URL
    #[arg(long, conflicts_with_all = ["archive", "version"])]
    pub url: Option<String>,

    /// List available firmware versions and exit
    #[arg(long)]
    pub list: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Validate and walk the flash sequence without touching a device
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Machine-readable output for tool integration
    #[arg(short, long)]
    pub machine: bool,

    /// Seconds to wait for the flashloader to re-enumerate after the jump
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub enum_wait: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_and_version_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["ntflash", "fw.zip", "--version", "1.12.0"]).is_err());
    }

    #[test]
    fn latest_conflicts_with_the_other_sources() {
        assert!(Cli::try_parse_from(["ntflash", "--latest", "--url", "http://x"]).is_err());
        let cli = Cli::try_parse_from(["ntflash", "--latest"]).unwrap();
        assert!(cli.latest);
    }

    #[test]
    fn flags_parse_with_their_short_forms() {
        let cli = Cli::try_parse_from(["ntflash", "-n", "-m", "-vv", "fw.zip"]).unwrap();
        assert!(cli.dry_run);
        assert!(cli.machine);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.archive.unwrap().to_str(), Some("fw.zip"));
    }

    #[test]
    fn enum_wait_defaults_to_five_seconds() {
        let cli = Cli::try_parse_from(["ntflash", "fw.zip"]).unwrap();
        assert_eq!(cli.enum_wait, 5);
    }
}
