use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::image_convert::ConvertError;
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("cannot read frame pixels: {0}")]
    Pixels(#[from] ConvertError),
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// Domain interface for face detection.
///
/// Detection is a pure function of the frame, so one detector can serve
/// several stage instances concurrently.
pub trait FaceDetector: Send + Sync {
    /// Face boxes in the frame's own pixel space.
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>, DetectionError>;
}
