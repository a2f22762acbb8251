use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::shared::clock::Clock;
use crate::shared::frame::Frame;
use crate::shared::image_convert;
use crate::shared::image_writer::ImageWriter;

pub const CAPTURED: &str = "captured";
pub const FACE: &str = "face";
pub const RECEIVED_FACE: &str = "received_face";

/// Best-effort dump of stage images as `<millis>-<suffix>.png`.
///
/// Failures are logged and swallowed; they never affect the record that is
/// being processed.
pub struct IntermediateResults {
    dir: PathBuf,
    writer: Box<dyn ImageWriter>,
    clock: Arc<dyn Clock>,
}

impl IntermediateResults {
    pub fn new(dir: PathBuf, writer: Box<dyn ImageWriter>, clock: Arc<dyn Clock>) -> Self {
        Self { dir, writer, clock }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, suffix: &str, frame: &Frame) {
        let path = self
            .dir
            .join(format!("{}-{suffix}.png", self.clock.now_millis()));
        match self.writer.write(&path, frame) {
            Ok(()) => log::debug!("Saved intermediate image {}", path.display()),
            Err(e) => log::warn!("Could not save {}: {e}", path.display()),
        }
    }

    /// Decodes an encoded payload first; undecodable payloads are skipped.
    pub fn save_payload(&self, suffix: &str, payload: &[u8]) {
        match image_convert::decode(payload) {
            Ok(frame) => self.save(suffix, &frame),
            Err(e) => log::warn!("Could not decode {suffix} payload for saving: {e}"),
        }
    }
}
