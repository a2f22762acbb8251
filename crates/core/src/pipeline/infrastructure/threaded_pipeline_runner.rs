use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::capture_stage::CaptureStage;
use crate::pipeline::detection_stage::DetectionStage;
use crate::pipeline::normalization_stage::NormalizationStage;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_runner::{
    CancelHandle, PipelineRunner, PipelineStages, RunConfig, RunSummary,
};
use crate::pipeline::recognition_stage::{Recognition, RecognitionStage};
use crate::pipeline::stage_error::{ErrorKind, StageError};
use crate::record::face_record::FaceRecord;
use crate::record::frame_record::FrameRecord;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Output of the detection thread. `FrameDone` follows the frame's faces.
enum Detected {
    Face(FaceRecord),
    FrameDone { faces: usize, detect_ms: f64 },
}

#[derive(Default)]
struct Tally {
    processed: usize,
    dropped: usize,
}

/// Runs capture and detection on their own threads and finishes each face
/// on the calling thread.
///
/// Layout: `capture → detect → main [normalize/recognise]`
///
/// Bounded channels give back-pressure: when recognition falls behind, the
/// capture thread blocks instead of queueing frames without limit.
pub struct ThreadedPipelineRunner {
    channel_capacity: usize,
}

impl ThreadedPipelineRunner {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

impl Default for ThreadedPipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRunner for ThreadedPipelineRunner {
    fn run(
        &self,
        stages: PipelineStages,
        config: RunConfig,
        logger: &mut dyn PipelineLogger,
        on_result: &mut dyn FnMut(&Recognition),
    ) -> Result<RunSummary, StageError> {
        let PipelineStages {
            capture,
            detection,
            normalization,
            recognition,
        } = stages;
        let cap = self.channel_capacity;

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameRecord>(cap);
        let (detected_tx, detected_rx) = crossbeam_channel::bounded::<Detected>(cap);

        let capture_handle =
            spawn_capture(capture, frame_tx, config.max_frames, config.cancel.clone());
        let detect_handle =
            spawn_detection(detection, frame_rx, detected_tx, config.cancel.clone());

        let mut summary = RunSummary::default();
        let main_error = run_main_loop(
            detected_rx,
            &normalization,
            &recognition,
            &config,
            logger,
            on_result,
            &mut summary,
        );
        if main_error.is_some() {
            config.cancel.cancel();
        }

        join_threads(capture_handle, detect_handle, main_error, &mut summary)?;
        logger.info(&format!(
            "{} frames, {} faces, {} recognised ({} strong), {} dropped",
            summary.frames,
            summary.faces,
            summary.recognised,
            summary.strong_matches,
            summary.dropped
        ));
        logger.summary();
        Ok(summary)
    }
}

fn spawn_capture(
    mut capture: CaptureStage,
    frame_tx: Sender<FrameRecord>,
    max_frames: Option<usize>,
    cancel: CancelHandle,
) -> JoinHandle<Result<Tally, StageError>> {
    thread::spawn(move || {
        let mut tally = Tally::default();
        while max_frames.map_or(true, |max| tally.processed < max) {
            if cancel.is_cancelled() {
                break;
            }
            match capture.tick() {
                Ok(Some(record)) => {
                    tally.processed += 1;
                    if frame_tx.send(record).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) if e.kind() == ErrorKind::Fatal => return Err(e),
                Err(e) => {
                    log::warn!("Capture tick dropped: {e}");
                    tally.dropped += 1;
                }
            }
        }
        Ok(tally)
    })
}

fn spawn_detection(
    detection: DetectionStage,
    frame_rx: Receiver<FrameRecord>,
    detected_tx: Sender<Detected>,
    cancel: CancelHandle,
) -> JoinHandle<Result<Tally, StageError>> {
    thread::spawn(move || {
        let mut tally = Tally::default();
        for record in frame_rx {
            if cancel.is_cancelled() {
                break;
            }

            let start = Instant::now();
            let faces = match detection.process(&record) {
                Ok(faces) => faces,
                Err(e) if e.kind() == ErrorKind::Fatal => {
                    cancel.cancel();
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("Frame {} dropped: {e}", record.id());
                    tally.dropped += 1;
                    continue;
                }
            };
            let detect_ms = elapsed_ms(start);
            tally.processed += 1;

            let count = faces.len();
            for face in faces {
                if detected_tx.send(Detected::Face(face)).is_err() {
                    return Ok(tally);
                }
            }
            let done = Detected::FrameDone {
                faces: count,
                detect_ms,
            };
            if detected_tx.send(done).is_err() {
                break;
            }
        }
        Ok(tally)
    })
}

/// Finishes faces in arrival order until the detection thread hangs up,
/// the run is cancelled, or a fatal error occurs.
fn run_main_loop(
    detected_rx: Receiver<Detected>,
    normalization: &NormalizationStage,
    recognition: &RecognitionStage,
    config: &RunConfig,
    logger: &mut dyn PipelineLogger,
    on_result: &mut dyn FnMut(&Recognition),
    summary: &mut RunSummary,
) -> Option<StageError> {
    let total = config.max_frames.unwrap_or(0);
    let mut frames_done = 0;

    for detected in detected_rx {
        if config.cancel.is_cancelled() {
            break;
        }
        match detected {
            Detected::FrameDone { faces, detect_ms } => {
                frames_done += 1;
                logger.timing("detect", detect_ms);
                logger.metric("faces_per_frame", faces as f64);
                logger.progress(frames_done, total);
            }
            Detected::Face(face) => {
                summary.faces += 1;
                match finish_face(face, normalization, recognition, logger) {
                    Ok(result) => {
                        summary.recognised += 1;
                        if result.strong_match {
                            summary.strong_matches += 1;
                        }
                        on_result(&result);
                    }
                    Err(e) if e.kind() == ErrorKind::Fatal => return Some(e),
                    Err(e) => {
                        log::warn!("Face dropped: {e}");
                        summary.dropped += 1;
                    }
                }
            }
        }
    }
    None
}

fn finish_face(
    face: FaceRecord,
    normalization: &NormalizationStage,
    recognition: &RecognitionStage,
    logger: &mut dyn PipelineLogger,
) -> Result<Recognition, StageError> {
    let start = Instant::now();
    let normalized = normalization.process(face)?;
    logger.timing("normalize", elapsed_ms(start));

    let start = Instant::now();
    let result = recognition.process(normalized)?;
    logger.timing("recognise", elapsed_ms(start));
    Ok(result)
}

/// Joins both worker threads and coalesces the first error encountered.
fn join_threads(
    capture_handle: JoinHandle<Result<Tally, StageError>>,
    detect_handle: JoinHandle<Result<Tally, StageError>>,
    mut first_error: Option<StageError>,
    summary: &mut RunSummary,
) -> Result<(), StageError> {
    fn set_if_none(slot: &mut Option<StageError>, err: StageError) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    match capture_handle.join() {
        Ok(Ok(tally)) => {
            summary.frames = tally.processed;
            summary.dropped += tally.dropped;
        }
        Ok(Err(e)) => set_if_none(&mut first_error, e),
        Err(_) => set_if_none(&mut first_error, StageError::Panicked("capture")),
    }

    match detect_handle.join() {
        Ok(Ok(tally)) => summary.dropped += tally.dropped,
        Ok(Err(e)) => set_if_none(&mut first_error, e),
        Err(_) => set_if_none(&mut first_error, StageError::Panicked("detection")),
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
