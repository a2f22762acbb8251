use std::sync::Arc;
use std::time::Duration;

use crate::benchmark::event_log::{BenchmarkStage, EventLine};
use crate::benchmark::recorder::BenchmarkSink;
use crate::capture::domain::camera::{Camera, CameraError};
use crate::capture::domain::pacer::{Pacer, WaitOutcome};
use crate::pipeline::intermediate_results::{IntermediateResults, CAPTURED};
use crate::pipeline::stage_error::StageError;
use crate::record::frame_record::FrameRecord;
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;
use crate::shared::image_convert;

/// Source stage: one frame per tick, with the camera held only for the grab.
pub struct CaptureStage {
    camera: Box<dyn Camera>,
    pacer: Box<dyn Pacer>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    benchmark: Arc<dyn BenchmarkSink>,
    intermediate: Option<Arc<IntermediateResults>>,
}

impl CaptureStage {
    pub fn new(
        camera: Box<dyn Camera>,
        pacer: Box<dyn Pacer>,
        interval: Duration,
        clock: Arc<dyn Clock>,
        benchmark: Arc<dyn BenchmarkSink>,
    ) -> Self {
        Self {
            camera,
            pacer,
            interval,
            clock,
            benchmark,
            intermediate: None,
        }
    }

    pub fn with_intermediate_results(mut self, results: Arc<IntermediateResults>) -> Self {
        self.intermediate = Some(results);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits one interval, then grabs a frame.
    ///
    /// Returns `Ok(None)` when the wait was interrupted; the camera is not
    /// touched in that case.
    pub fn tick(&mut self) -> Result<Option<FrameRecord>, StageError> {
        if self.pacer.wait(self.interval) == WaitOutcome::Interrupted {
            log::debug!("Capture wait interrupted");
            return Ok(None);
        }

        let frame = self.grab_once()?;
        let created_at = self.clock.now_millis();
        let record = FrameRecord::new(image_convert::encode_png(&frame)?, created_at);

        if let Some(results) = &self.intermediate {
            results.save(CAPTURED, &frame);
        }
        self.benchmark.record(
            BenchmarkStage::Capture,
            EventLine::new(record.id().to_string(), created_at),
        );
        log::debug!(
            "Captured frame {} ({}x{})",
            record.id(),
            frame.width(),
            frame.height()
        );
        Ok(Some(record))
    }

    fn grab_once(&mut self) -> Result<Frame, CameraError> {
        let grabbed = self.camera.start().and_then(|()| self.camera.grab());
        self.camera.stop();
        grabbed.map_err(|e| {
            log::error!("Capture failed: {e}");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::recorder::MemoryBenchmarkSink;
    use crate::capture::infrastructure::channel_pacer::ChannelPacer;
    use crate::pipeline::test_support::{InstantPacer, ScriptedCamera};
    use crate::shared::clock::ManualClock;
    use crate::shared::image_writer::ImageFileWriter;

    fn stage(camera: ScriptedCamera, sink: Arc<MemoryBenchmarkSink>) -> CaptureStage {
        CaptureStage::new(
            Box::new(camera),
            Box::new(InstantPacer),
            Duration::from_millis(1000),
            Arc::new(ManualClock::new(1000)),
            sink,
        )
    }

    #[test]
    fn test_tick_emits_frame_record_and_capture_line() {
        let sink = Arc::new(MemoryBenchmarkSink::new());
        let camera = ScriptedCamera::new(vec![Ok(Frame::filled(8, 6, 50))]);
        let log = camera.calls();
        let mut stage = stage(camera, sink.clone());

        let record = stage.tick().unwrap().unwrap();
        assert_eq!(record.created_at(), 1000);
        let decoded = image_convert::decode(record.payload()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));

        let lines = sink.events(BenchmarkStage::Capture);
        assert_eq!(lines, vec![EventLine::new(record.id().to_string(), 1000)]);
        assert_eq!(*log.lock().unwrap(), vec!["start", "grab", "stop"]);
    }

    #[test]
    fn test_failed_grab_still_releases_camera() {
        let sink = Arc::new(MemoryBenchmarkSink::new());
        let camera = ScriptedCamera::new(vec![Err(CameraError::Grab("timeout".into()))]);
        let log = camera.calls();
        let mut stage = stage(camera, sink.clone());

        let err = stage.tick().unwrap_err();
        assert!(matches!(err, StageError::Camera(CameraError::Grab(_))));
        assert_eq!(*log.lock().unwrap(), vec!["start", "grab", "stop"]);
        assert!(sink.events(BenchmarkStage::Capture).is_empty());
    }

    #[test]
    fn test_busy_camera_is_transient_and_next_tick_succeeds() {
        let sink = Arc::new(MemoryBenchmarkSink::new());
        let camera = ScriptedCamera::new(vec![Ok(Frame::filled(4, 4, 1))]).busy_once();
        let mut stage = stage(camera, sink.clone());

        let err = stage.tick().unwrap_err();
        assert_eq!(err.kind(), crate::pipeline::stage_error::ErrorKind::Transient);
        assert!(stage.tick().unwrap().is_some());
        assert_eq!(sink.events(BenchmarkStage::Capture).len(), 1);
    }

    #[test]
    fn test_interrupted_wait_skips_the_camera() {
        let sink = Arc::new(MemoryBenchmarkSink::new());
        let camera = ScriptedCamera::new(vec![Ok(Frame::filled(4, 4, 1))]);
        let log = camera.calls();
        let pacer = ChannelPacer::new();
        pacer.interrupt_handle().interrupt();
        let mut stage = CaptureStage::new(
            Box::new(camera),
            Box::new(pacer),
            Duration::from_secs(60),
            Arc::new(ManualClock::new(0)),
            sink,
        );

        assert!(stage.tick().unwrap().is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_saves_captured_image() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(42));
        let results = Arc::new(IntermediateResults::new(
            dir.path().to_path_buf(),
            Box::new(ImageFileWriter::new()),
            clock.clone(),
        ));
        let mut stage = CaptureStage::new(
            Box::new(ScriptedCamera::new(vec![Ok(Frame::filled(4, 4, 1))])),
            Box::new(InstantPacer),
            Duration::ZERO,
            clock,
            Arc::new(MemoryBenchmarkSink::new()),
        )
        .with_intermediate_results(results);

        stage.tick().unwrap();
        assert!(dir.path().join("42-captured.png").exists());
    }
}
