use std::sync::Arc;

use crate::benchmark::event_log::{BenchmarkStage, EventLine, SummaryLine};
use crate::benchmark::recorder::BenchmarkSink;
use crate::pipeline::intermediate_results::{IntermediateResults, RECEIVED_FACE};
use crate::pipeline::stage_error::StageError;
use crate::recognition::domain::prediction::{MatchPolicy, Prediction};
use crate::recognition::infrastructure::classifier_cache::ClassifierCache;
use crate::record::attributes::{CAPTURE, DETECT, RECOGNISE};
use crate::record::face_record::FaceRecord;
use crate::shared::clock::Clock;
use crate::shared::image_convert;

/// Outcome for one normalized face.
#[derive(Clone, Debug)]
pub struct Recognition {
    pub record: FaceRecord,
    pub prediction: Prediction,
    pub strong_match: bool,
}

/// Terminal stage: labels a face and closes its benchmark lineage.
pub struct RecognitionStage {
    classifier: Arc<ClassifierCache>,
    policy: MatchPolicy,
    clock: Arc<dyn Clock>,
    benchmark: Arc<dyn BenchmarkSink>,
    intermediate: Option<Arc<IntermediateResults>>,
}

impl RecognitionStage {
    pub fn new(
        classifier: Arc<ClassifierCache>,
        policy: MatchPolicy,
        clock: Arc<dyn Clock>,
        benchmark: Arc<dyn BenchmarkSink>,
    ) -> Self {
        Self {
            classifier,
            policy,
            clock,
            benchmark,
            intermediate: None,
        }
    }

    pub fn with_intermediate_results(mut self, results: Arc<IntermediateResults>) -> Self {
        self.intermediate = Some(results);
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Trains the classifier on first use. A training failure is fatal for
    /// the run; every other failure only drops this face.
    pub fn process(&self, face: FaceRecord) -> Result<Recognition, StageError> {
        let model = self.classifier.get()?;
        let gray = image_convert::decode_gray(face.payload())?;
        if let Some(results) = &self.intermediate {
            results.save(RECEIVED_FACE, &image_convert::from_gray(gray.clone()));
        }

        let prediction = model.predict(&gray)?;
        let recognised_at = self.clock.now_millis();
        let record = face.with_event(RECOGNISE, recognised_at)?;
        let strong_match = self.policy.is_strong_match(&prediction);

        self.write_benchmark(&record, recognised_at);
        log::info!(
            "Face {} of frame {}: label {} (confidence {:.1})",
            record.id(),
            record.parent_id(),
            prediction.label,
            prediction.confidence
        );
        if strong_match {
            log::warn!(
                "Strong match for label {} in frame {} (confidence {:.1}, threshold {:.1})",
                prediction.label,
                record.parent_id(),
                prediction.confidence,
                self.policy.threshold()
            );
        }

        Ok(Recognition {
            record,
            prediction,
            strong_match,
        })
    }

    fn write_benchmark(&self, record: &FaceRecord, recognised_at: u64) {
        self.benchmark.record(
            BenchmarkStage::Recognise,
            EventLine::new(record.id().to_string(), recognised_at),
        );

        let parent = record.parent_id().to_string();

        let attributes = record.attributes();
        let (Some(captured_at), Some(detected_at)) =
            (attributes.get(CAPTURE), attributes.get(DETECT))
        else {
            log::debug!("Face {} has no capture/detect times, no summary", record.id());
            return;
        };
        log::info!(
            "{parent} : {} : {}",
            detected_at.saturating_sub(captured_at),
            recognised_at.saturating_sub(detected_at)
        );
        self.benchmark.record_summary(SummaryLine {
            parent_id: parent,
            capture_ts: captured_at,
            detect_ts: detected_at,
            recognise_ts: recognised_at,
        });
    }
}
