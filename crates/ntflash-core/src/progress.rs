//! Progress and event model
//!
//! Flashing is driven headless by embedding tools, so progress is a stable
//! contract, not cosmetics: every stage has a fixed checkpoint percentage,
//! and segment progress inside a transfer stage moves from that stage's
//! checkpoint toward the next one, never backwards. Presentation (machine
//! protocol lines, progress bars) lives behind [`EventSink`] in the binary.

/// The named stages of a flash run, in checkpoint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Start,
    SdpConnect,
    BlCheck,
    BlFound,
    SdpUpload,
    SdpJump,
    WaitEnum,
    BlConnect,
    Configure,
    Erase,
    Fcb,
    Write,
    Reset,
    Complete,
}

impl Stage {
    /// Tag used on the machine protocol lines.
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Load => "LOAD",
            Stage::Start => "START",
            Stage::SdpConnect => "SDP_CONNECT",
            Stage::BlCheck => "BL_CHECK",
            Stage::BlFound => "BL_FOUND",
            Stage::SdpUpload => "SDP_UPLOAD",
            Stage::SdpJump => "SDP_JUMP",
            Stage::WaitEnum => "WAIT_ENUM",
            Stage::BlConnect => "BL_CONNECT",
            Stage::Configure => "CONFIGURE",
            Stage::Erase => "ERASE",
            Stage::Fcb => "FCB",
            Stage::Write => "WRITE",
            Stage::Reset => "RESET",
            Stage::Complete => "COMPLETE",
        }
    }

    /// Fixed percentage reported when the stage is entered. These values are
    /// contractual; downstream tools key on them.
    pub fn checkpoint(self) -> u8 {
        match self {
            Stage::Load => 0,
            Stage::Start => 0,
            Stage::SdpConnect => 5,
            Stage::BlCheck => 10,
            Stage::BlFound => 15,
            Stage::SdpUpload => 15,
            Stage::SdpJump => 25,
            Stage::WaitEnum => 30,
            Stage::BlConnect => 40,
            Stage::Configure => 50,
            Stage::Erase => 55,
            Stage::Fcb => 60,
            Stage::Write => 65,
            Stage::Reset => 95,
            Stage::Complete => 100,
        }
    }

    /// Upper bound for segment progress within this stage: the next stage's
    /// checkpoint. Only the two streaming stages span a range.
    pub fn ceiling(self) -> u8 {
        match self {
            Stage::SdpUpload => Stage::SdpJump.checkpoint(),
            Stage::Write => Stage::Reset.checkpoint(),
            other => other.checkpoint(),
        }
    }
}

/// One observational event. No identity, nothing persists across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
}

/// Where events go. Implementations must not block for long: they run on
/// the flashing thread, between device commands.
pub trait EventSink {
    /// A stage boundary was crossed.
    fn status(&mut self, event: &ProgressEvent);

    /// Incremental progress within the current stage.
    fn progress(&mut self, event: &ProgressEvent);
}

/// Maps stage transitions and raw segment callbacks onto the normalized
/// event stream. Holds no state beyond the current stage and the last
/// percentage emitted, which enforces monotonicity within a stage.
pub struct ProgressModel<'a> {
    sink: &'a mut dyn EventSink,
    stage: Stage,
    floor: u8,
}

impl<'a> ProgressModel<'a> {
    pub fn new(sink: &'a mut dyn EventSink) -> Self {
        Self {
            sink,
            stage: Stage::Start,
            floor: 0,
        }
    }

    /// Enter `stage`, emitting its fixed checkpoint.
    pub fn enter(&mut self, stage: Stage, message: impl Into<String>) {
        self.stage = stage;
        self.floor = stage.checkpoint();
        self.sink.status(&ProgressEvent {
            stage,
            percent: stage.checkpoint(),
            message: message.into(),
        });
    }

    /// Report `current` of `total` bytes transferred in the current stage.
    /// The emitted percentage is scaled into the stage's
    /// `[checkpoint, ceiling]` window and clamped non-decreasing.
    pub fn segment(&mut self, current: usize, total: usize) {
        let base = self.stage.checkpoint() as usize;
        let ceiling = self.stage.ceiling() as usize;
        let span = ceiling - base;

        let scaled = if total == 0 {
            ceiling
        } else {
            let current = current.min(total);
            base + (current * span + total / 2) / total
        };
        let percent = (scaled as u8).max(self.floor);
        self.floor = percent;

        self.sink.progress(&ProgressEvent {
            stage: self.stage,
            percent,
            message: format!("{}/{} bytes", current, total),
        });
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        statuses: Vec<(Stage, u8)>,
        progresses: Vec<u8>,
    }

    impl EventSink for Capture {
        fn status(&mut self, event: &ProgressEvent) {
            self.statuses.push((event.stage, event.percent));
        }

        fn progress(&mut self, event: &ProgressEvent) {
            self.progresses.push(event.percent);
        }
    }

    const ALL_STAGES: [Stage; 15] = [
        Stage::Load,
        Stage::Start,
        Stage::SdpConnect,
        Stage::BlCheck,
        Stage::BlFound,
        Stage::SdpUpload,
        Stage::SdpJump,
        Stage::WaitEnum,
        Stage::BlConnect,
        Stage::Configure,
        Stage::Erase,
        Stage::Fcb,
        Stage::Write,
        Stage::Reset,
        Stage::Complete,
    ];

    #[test]
    fn checkpoints_are_non_decreasing() {
        let mut last = 0;
        for stage in ALL_STAGES {
            assert!(
                stage.checkpoint() >= last,
                "{} regressed below {}",
                stage.tag(),
                last
            );
            last = stage.checkpoint();
        }
        assert_eq!(Stage::Complete.checkpoint(), 100);
    }

    #[test]
    fn ceilings_match_following_checkpoints() {
        assert_eq!(Stage::SdpUpload.ceiling(), 25);
        assert_eq!(Stage::Write.ceiling(), 95);
        assert_eq!(Stage::Erase.ceiling(), Stage::Erase.checkpoint());
    }

    #[test]
    fn segment_progress_spans_the_stage_window() {
        let mut capture = Capture::default();
        let mut model = ProgressModel::new(&mut capture);
        model.enter(Stage::Write, "Writing firmware");
        model.segment(0, 1000);
        model.segment(500, 1000);
        model.segment(1000, 1000);

        assert_eq!(capture.progresses, vec![65, 80, 95]);
    }

    #[test]
    fn segment_progress_never_decreases() {
        let mut capture = Capture::default();
        let mut model = ProgressModel::new(&mut capture);
        model.enter(Stage::SdpUpload, "Uploading");
        // Out-of-order callbacks still yield a monotone stream.
        for (current, total) in [(200, 400), (100, 400), (300, 400), (400, 400)] {
            model.segment(current, total);
        }

        let mut last = 0;
        for &p in &capture.progresses {
            assert!(p >= last);
            assert!((Stage::SdpUpload.checkpoint()..=Stage::SdpUpload.ceiling()).contains(&p));
            last = p;
        }
        assert_eq!(last, Stage::SdpUpload.ceiling());
    }

    #[test]
    fn zero_total_reports_the_ceiling() {
        let mut capture = Capture::default();
        let mut model = ProgressModel::new(&mut capture);
        model.enter(Stage::Write, "Writing firmware");
        model.segment(0, 0);
        assert_eq!(capture.progresses, vec![95]);
    }

    #[test]
    fn entering_a_stage_emits_its_checkpoint() {
        let mut capture = Capture::default();
        let mut model = ProgressModel::new(&mut capture);
        model.enter(Stage::SdpConnect, "Connecting to SDP bootloader");
        model.enter(Stage::Complete, "Flash complete");
        assert_eq!(
            capture.statuses,
            vec![(Stage::SdpConnect, 5), (Stage::Complete, 100)]
        );
    }
}
