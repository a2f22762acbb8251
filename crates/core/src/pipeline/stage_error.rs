use thiserror::Error;

use crate::capture::domain::camera::CameraError;
use crate::detection::domain::face_detector::DetectionError;
use crate::normalization::face_normalizer::NormalizeError;
use crate::recognition::domain::classifier_model::PredictError;
use crate::recognition::infrastructure::training_corpus::TrainingError;
use crate::record::attributes::AttributeError;
use crate::shared::image_convert::ConvertError;

/// How a failed record affects the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device may recover; the next tick retries.
    Transient,
    /// This record is dropped; the run continues.
    Data,
    /// The run stops.
    Fatal,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    #[error("classifier unavailable: {0}")]
    Training(#[from] TrainingError),
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Camera(_) => ErrorKind::Transient,
            StageError::Convert(_)
            | StageError::Detection(_)
            | StageError::Normalize(_)
            | StageError::Predict(_)
            | StageError::Attribute(_) => ErrorKind::Data,
            StageError::Training(_) | StageError::Panicked(_) => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            StageError::from(CameraError::Busy("video0".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            StageError::from(PredictError::SizeMismatch {
                expected: (92, 112),
                actual: (10, 10),
            })
            .kind(),
            ErrorKind::Data
        );
        assert_eq!(
            StageError::from(TrainingError::EmptyCorpus("training".into())).kind(),
            ErrorKind::Fatal
        );
        assert_eq!(StageError::Panicked("capture").kind(), ErrorKind::Fatal);
    }
}
