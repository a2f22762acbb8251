use std::sync::Arc;

use crate::benchmark::event_log::{BenchmarkStage, EventLine, LineageLine};
use crate::benchmark::recorder::BenchmarkSink;
use crate::detection::domain::face_detector::FaceDetector;
use crate::normalization::face_normalizer::crop_region;
use crate::pipeline::stage_error::StageError;
use crate::record::attributes::DETECT;
use crate::record::face_record::FaceRecord;
use crate::record::frame_record::FrameRecord;
use crate::shared::clock::Clock;
use crate::shared::image_convert;

/// Splits a captured frame into one face record per detected box.
pub struct DetectionStage {
    detector: Arc<dyn FaceDetector>,
    clock: Arc<dyn Clock>,
    benchmark: Arc<dyn BenchmarkSink>,
}

impl DetectionStage {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        clock: Arc<dyn Clock>,
        benchmark: Arc<dyn BenchmarkSink>,
    ) -> Self {
        Self {
            detector,
            clock,
            benchmark,
        }
    }

    /// Each face carries the crop of its box as payload and inherits the
    /// frame's capture time. A frame with no faces yields an empty vec but
    /// still gets its detect line. Every face gets a lineage line so its
    /// recognise line can be joined back to the frame.
    pub fn process(&self, frame: &FrameRecord) -> Result<Vec<FaceRecord>, StageError> {
        let image = image_convert::decode(frame.payload())?;
        let regions = self.detector.detect(&image)?;
        let detected_at = self.clock.now_millis();

        let mut faces = Vec::with_capacity(regions.len());
        for region in regions {
            let crop = match crop_region(&image, region) {
                Ok(crop) => crop,
                Err(e) => {
                    log::warn!("Skipping box in frame {}: {e}", frame.id());
                    continue;
                }
            };
            let payload = image_convert::encode_png(&crop)?;
            faces.push(FaceRecord::from_frame(
                frame,
                region,
                payload,
                DETECT,
                detected_at,
            )?);
        }

        let frame_id = frame.id().to_string();
        self.benchmark.record(
            BenchmarkStage::Detect,
            EventLine::new(frame_id.clone(), detected_at),
        );
        for face in &faces {
            self.benchmark
                .record_lineage(LineageLine::new(face.id().to_string(), frame_id.clone()));
        }
        log::debug!("Frame {}: {} face(s)", frame.id(), faces.len());
        Ok(faces)
    }
}
