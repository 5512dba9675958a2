//! Human and machine event reporting
//!
//! One [`EventSink`] implementation per audience. Machine mode writes the
//! line protocol (`STATUS:<STAGE>:<PERCENT>:<MESSAGE>`, `PROGRESS:...`,
//! `ERROR:...`) to its writer (stdout in production), flushed per line so
//! embedding tools can stream it; nothing else reaches that stream. Human
//! mode prints phase banners and drives an indicatif bar through the two
//! streaming stages.

use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressStyle};
use ntflash_core::progress::{EventSink, ProgressEvent, Stage};

pub enum Reporter {
    Machine(MachineReporter),
    Human(HumanReporter),
}

impl Reporter {
    pub fn new(machine: bool) -> Self {
        if machine {
            Reporter::Machine(MachineReporter::new(Box::new(io::stdout())))
        } else {
            Reporter::Human(HumanReporter::default())
        }
    }

    /// Emit the package-loading checkpoint. This happens before the
    /// orchestrator exists, so the binary reports it directly.
    pub fn loading(&mut self, message: &str) {
        self.status(&ProgressEvent {
            stage: Stage::Load,
            percent: Stage::Load.checkpoint(),
            message: message.to_string(),
        });
    }

    /// Report a fatal error in the mode's own format.
    pub fn error(&mut self, message: &str) {
        match self {
            Reporter::Machine(machine) => machine.error(message),
            Reporter::Human(human) => {
                human.finish_bar();
                eprintln!("ERROR: {}", message);
            }
        }
    }

    /// Extra free-form lines for the human; machine mode stays silent so
    /// the protocol stream carries nothing else.
    pub fn note(&mut self, message: &str) {
        if let Reporter::Human(human) = self {
            human.finish_bar();
            println!("{}", message);
        }
    }
}

impl EventSink for Reporter {
    fn status(&mut self, event: &ProgressEvent) {
        match self {
            Reporter::Machine(machine) => machine.line("STATUS", event),
            Reporter::Human(human) => human.stage(event),
        }
    }

    fn progress(&mut self, event: &ProgressEvent) {
        match self {
            Reporter::Machine(machine) => machine.line("PROGRESS", event),
            Reporter::Human(human) => human.segment(event),
        }
    }
}

/// Line-protocol emitter for embedding tools.
pub struct MachineReporter {
    out: Box<dyn Write>,
}

impl MachineReporter {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    fn line(&mut self, kind: &str, event: &ProgressEvent) {
        let _ = writeln!(
            self.out,
            "{}:{}:{}:{}",
            kind,
            event.stage.tag(),
            event.percent,
            event.message
        );
        let _ = self.out.flush();
    }

    fn error(&mut self, message: &str) {
        let _ = writeln!(self.out, "ERROR:{}", message);
        let _ = self.out.flush();
    }
}

/// Banner-and-progress-bar presentation for a person at a terminal.
#[derive(Default)]
pub struct HumanReporter {
    bar: Option<ProgressBar>,
}

impl HumanReporter {
    fn stage(&mut self, event: &ProgressEvent) {
        self.finish_bar();
        if let Some(banner) = banner(event.stage) {
            println!("{}", banner);
        } else if event.stage == Stage::Load {
            // No fixed banner; the message carries the archive path.
            println!("{}", event.message);
        }
        if matches!(event.stage, Stage::SdpUpload | Stage::Write) {
            self.bar = Some(make_bar(event.stage));
        }
    }

    fn segment(&mut self, event: &ProgressEvent) {
        if let Some(bar) = &self.bar {
            let base = event.stage.checkpoint() as u64;
            let ceiling = event.stage.ceiling() as u64;
            let span = (ceiling - base).max(1);
            let position = (event.percent as u64).saturating_sub(base).min(span);
            bar.set_position(position * 100 / span);
        }
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn make_bar(stage: Stage) -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("  [{bar:40.cyan/blue}] {pos}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=>-"));
    bar.set_message(stage.tag());
    bar
}

fn banner(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Start => Some("=== Starting disting NT flash ==="),
        Stage::SdpConnect => Some("[1/7] Connecting to SDP bootloader..."),
        Stage::BlFound => Some("Device already in flashloader mode, skipping SDP phase..."),
        Stage::SdpUpload => Some("[2/7] Uploading flashloader to RAM..."),
        Stage::SdpJump => Some("[3/7] Starting flashloader..."),
        Stage::WaitEnum => Some("[4/7] Waiting for flashloader to start..."),
        Stage::BlConnect => Some("[5/7] Connecting to flashloader..."),
        Stage::Configure => Some("[6/7] Configuring flash and erasing..."),
        Stage::Write => Some("[7/7] Writing firmware..."),
        Stage::Reset => Some("Resetting device..."),
        Stage::Complete => Some("=== Flash complete! ==="),
        Stage::Load | Stage::BlCheck | Stage::Erase | Stage::Fcb => None,
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::SharedBuffer;
    use super::*;

    fn machine_reporter() -> (Reporter, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let reporter = Reporter::Machine(MachineReporter::new(Box::new(buffer.clone())));
        (reporter, buffer)
    }

    #[test]
    fn machine_status_and_progress_lines_follow_the_protocol() {
        let (mut reporter, buffer) = machine_reporter();
        reporter.status(&ProgressEvent {
            stage: Stage::Write,
            percent: 65,
            message: "Writing firmware".to_string(),
        });
        reporter.progress(&ProgressEvent {
            stage: Stage::Write,
            percent: 80,
            message: "51200/102400 bytes".to_string(),
        });

        assert_eq!(
            buffer.contents(),
            "STATUS:WRITE:65:Writing firmware\nPROGRESS:WRITE:80:51200/102400 bytes\n"
        );
    }

    #[test]
    fn machine_error_line_carries_the_message_verbatim() {
        let (mut reporter, buffer) = machine_reporter();
        reporter.error("flash erase failed");
        assert_eq!(buffer.contents(), "ERROR:flash erase failed\n");
    }

    #[test]
    fn machine_loading_checkpoint_uses_the_load_tag() {
        let (mut reporter, buffer) = machine_reporter();
        reporter.loading("Loading firmware package: fw.zip");
        assert_eq!(
            buffer.contents(),
            "STATUS:LOAD:0:Loading firmware package: fw.zip\n"
        );
    }

    #[test]
    fn machine_mode_suppresses_notes() {
        let (mut reporter, buffer) = machine_reporter();
        reporter.note("Known versions: 1.12.0");
        reporter.note("Make sure disting NT is in bootloader mode:");
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn streaming_stages_get_a_bar_and_plain_stages_do_not() {
        assert!(matches!(banner(Stage::Write), Some(_)));
        assert!(banner(Stage::BlCheck).is_none());
        assert!(banner(Stage::Erase).is_none());
    }

    #[test]
    fn every_terminal_banner_is_distinct() {
        let banners: Vec<&str> = [
            Stage::Start,
            Stage::SdpConnect,
            Stage::SdpUpload,
            Stage::SdpJump,
            Stage::WaitEnum,
            Stage::BlConnect,
            Stage::Configure,
            Stage::Write,
            Stage::Reset,
            Stage::Complete,
        ]
        .into_iter()
        .filter_map(banner)
        .collect();
        let mut deduped = banners.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), banners.len());
    }
}
