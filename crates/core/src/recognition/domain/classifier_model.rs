use std::collections::BTreeSet;
use std::fmt;

use image::GrayImage;
use thiserror::Error;

use crate::recognition::domain::algorithm::RecognizerAlgorithm;
use crate::recognition::domain::prediction::Prediction;
use crate::shared::image_convert::{self, ConvertError};

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("face is {actual:?}, model was trained on {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error(transparent)]
    Decode(#[from] ConvertError),
}

/// Fitted parameters of one algorithm family.
///
/// Implementations are immutable after training; `predict` allocates its
/// own scratch space so a single backend serves concurrent callers.
pub trait FaceClassifier: Send + Sync {
    /// Nearest training label for a face of the training size.
    fn predict(&self, face: &GrayImage) -> Prediction;
}

/// Trained, read-only appearance model.
pub struct ClassifierModel {
    algorithm: RecognizerAlgorithm,
    labels: BTreeSet<i32>,
    face_size: (u32, u32),
    backend: Box<dyn FaceClassifier>,
}

impl ClassifierModel {
    pub fn new(
        algorithm: RecognizerAlgorithm,
        labels: BTreeSet<i32>,
        face_size: (u32, u32),
        backend: Box<dyn FaceClassifier>,
    ) -> Self {
        Self {
            algorithm,
            labels,
            face_size,
            backend,
        }
    }

    pub fn algorithm(&self) -> RecognizerAlgorithm {
        self.algorithm
    }

    pub fn labels(&self) -> &BTreeSet<i32> {
        &self.labels
    }

    pub fn face_size(&self) -> (u32, u32) {
        self.face_size
    }

    pub fn predict(&self, face: &GrayImage) -> Result<Prediction, PredictError> {
        if face.dimensions() != self.face_size {
            return Err(PredictError::SizeMismatch {
                expected: self.face_size,
                actual: face.dimensions(),
            });
        }
        Ok(self.backend.predict(face))
    }

    /// Decodes an encoded face to luma and predicts.
    pub fn predict_payload(&self, payload: &[u8]) -> Result<Prediction, PredictError> {
        let face = image_convert::decode_gray(payload)?;
        self.predict(&face)
    }
}

impl fmt::Debug for ClassifierModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierModel")
            .field("algorithm", &self.algorithm)
            .field("labels", &self.labels)
            .field("face_size", &self.face_size)
            .finish_non_exhaustive()
    }
}
