use std::sync::Arc;

use crate::normalization::face_normalizer::FaceNormalizer;
use crate::pipeline::intermediate_results::{IntermediateResults, FACE};
use crate::pipeline::stage_error::StageError;
use crate::record::attributes::NORMALIZE;
use crate::record::face_record::FaceRecord;
use crate::shared::clock::Clock;
use crate::shared::image_convert;
use crate::shared::region::Region;

/// Resizes each face crop to the recognizer's input size.
pub struct NormalizationStage {
    normalizer: FaceNormalizer,
    clock: Arc<dyn Clock>,
    intermediate: Option<Arc<IntermediateResults>>,
}

impl NormalizationStage {
    pub fn new(normalizer: FaceNormalizer, clock: Arc<dyn Clock>) -> Self {
        Self {
            normalizer,
            clock,
            intermediate: None,
        }
    }

    pub fn with_intermediate_results(mut self, results: Arc<IntermediateResults>) -> Self {
        self.intermediate = Some(results);
        self
    }

    pub fn process(&self, face: FaceRecord) -> Result<FaceRecord, StageError> {
        let crop = image_convert::decode(face.payload())?;
        let whole = Region::full(crop.width(), crop.height());
        let normalized = self.normalizer.normalize(&crop, whole)?;

        if let Some(results) = &self.intermediate {
            results.save(FACE, &normalized);
        }
        let payload = image_convert::encode_png(&normalized)?;
        Ok(face.with_payload(payload, NORMALIZE, self.clock.now_millis())?)
    }
}
