pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;

/// Normalized face size expected by the recognizer (AT&T corpus layout).
pub const DEFAULT_FACE_WIDTH: u32 = 92;
pub const DEFAULT_FACE_HEIGHT: u32 = 112;

pub const DEFAULT_SCALE_FACTOR: f64 = 1.5;
pub const DEFAULT_MIN_NEIGHBOURS: usize = 3;
/// Window stride at scale 1.0, in pixels.
pub const DEFAULT_WINDOW_STEP: u32 = 2;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 10000.0;

/// Extensions accepted when loading a training corpus.
pub const TRAINING_EXTENSIONS: &[&str] = &["jpg", "jpeg", "pgm", "png"];

/// Extensions replayed by the directory camera.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp", "pgm"];
