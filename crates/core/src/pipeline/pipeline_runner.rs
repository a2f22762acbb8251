use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::infrastructure::channel_pacer::PacerInterrupt;
use crate::pipeline::capture_stage::CaptureStage;
use crate::pipeline::detection_stage::DetectionStage;
use crate::pipeline::normalization_stage::NormalizationStage;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::recognition_stage::{Recognition, RecognitionStage};
use crate::pipeline::stage_error::StageError;

/// The four stages of one run, wired but not started.
pub struct PipelineStages {
    pub capture: CaptureStage,
    pub detection: DetectionStage,
    pub normalization: NormalizationStage,
    pub recognition: RecognitionStage,
}

/// Stops a run from any thread, including one blocked in the capture wait.
#[derive(Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    interrupt: Option<PacerInterrupt>,
}

impl CancelHandle {
    pub fn new(interrupt: Option<PacerInterrupt>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            interrupt,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(interrupt) = &self.interrupt {
            interrupt.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Configuration for one run.
pub struct RunConfig {
    /// Stop after this many captured frames; `None` runs until cancelled.
    pub max_frames: Option<usize>,
    pub cancel: CancelHandle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub faces: usize,
    pub recognised: usize,
    pub strong_matches: usize,
    /// Records dropped after a transient or data error.
    pub dropped: usize,
}

/// Drives the stages from capture to recognition.
pub trait PipelineRunner: Send {
    /// `on_result` sees every recognised face in arrival order. A fatal
    /// stage error ends the run and is returned.
    fn run(
        &self,
        stages: PipelineStages,
        config: RunConfig,
        logger: &mut dyn PipelineLogger,
        on_result: &mut dyn FnMut(&Recognition),
    ) -> Result<RunSummary, StageError>;
}
