use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera is busy: {0}")]
    Busy(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("frame grab failed: {0}")]
    Grab(String),
    #[error("camera was not started")]
    NotStarted,
}

/// A frame source that is acquired and released around every grab.
///
/// The capture stage calls `start`, `grab` once, then `stop`, so the device
/// is never held between ticks. `stop` must be safe to call after a failed
/// `start` or `grab`.
pub trait Camera: Send {
    fn start(&mut self) -> Result<(), CameraError>;

    fn grab(&mut self) -> Result<Frame, CameraError>;

    fn stop(&mut self);
}
