use std::path::Path;

use image::GrayImage;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::detection::domain::neighbour_merger::NeighbourMerger;
use crate::detection::infrastructure::cascade::{scaled, Cascade, CascadeError};
use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::shared::constants::{DEFAULT_MIN_NEIGHBOURS, DEFAULT_SCALE_FACTOR, DEFAULT_WINDOW_STEP};
use crate::shared::frame::Frame;
use crate::shared::image_convert;
use crate::shared::region::Region;
use crate::shared::settings::PipelineSettings;

/// Multi-scale scan parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Growth of the scan window between pyramid levels. Must exceed 1.
    pub scale_factor: f64,
    pub min_neighbours: usize,
    /// Window stride at scale 1.0, in pixels.
    pub window_step: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbours: DEFAULT_MIN_NEIGHBOURS,
            window_step: DEFAULT_WINDOW_STEP,
        }
    }
}

impl DetectorConfig {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            scale_factor: settings.scale_factor,
            min_neighbours: settings.min_neighbours,
            window_step: settings.window_step,
        }
    }
}

/// Viola-Jones style detector driven by a [`Cascade`] definition.
///
/// The window is scaled instead of the image, so every scale reads the same
/// integral image and boxes come out in original coordinates.
pub struct CascadeDetector {
    cascade: Cascade,
    config: DetectorConfig,
    merger: NeighbourMerger,
}

impl CascadeDetector {
    pub fn from_path(path: &Path, config: DetectorConfig) -> Result<Self, CascadeError> {
        let cascade = Cascade::load(path)?;
        log::info!(
            "Loaded cascade {} ({} stages, {}x{} window)",
            path.display(),
            cascade.stages.len(),
            cascade.window[0],
            cascade.window[1]
        );
        Self::new(cascade, config)
    }

    pub fn new(cascade: Cascade, config: DetectorConfig) -> Result<Self, CascadeError> {
        cascade.validate()?;
        if !(config.scale_factor > 1.0 && config.scale_factor.is_finite()) {
            return Err(CascadeError::Invalid(format!(
                "scale factor must be greater than 1.0, got {}",
                config.scale_factor
            )));
        }
        if config.window_step == 0 {
            return Err(CascadeError::Invalid("window step must be at least 1".into()));
        }
        let merger = NeighbourMerger::new(config.min_neighbours);
        Ok(Self {
            cascade,
            config,
            merger,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Every window that passes all stages, before grouping.
    pub fn raw_hits(&self, gray: &GrayImage) -> Vec<Region> {
        let ii = IntegralImage::new(gray);
        let (img_w, img_h) = (ii.width(), ii.height());
        let (base_w, base_h) = self.cascade.window_size();
        let n_stages = self.cascade.stages.len();

        let mut hits = Vec::new();
        let mut scale = 1.0;
        loop {
            let win_w = scaled(base_w, scale);
            let win_h = scaled(base_h, scale);
            if win_w > img_w || win_h > img_h {
                break;
            }
            let step = ((self.config.window_step as f64 * scale).round() as usize).max(1);

            for y in (0..=img_h - win_h).step_by(step) {
                for x in (0..=img_w - win_w).step_by(step) {
                    if self.cascade.stages_passed(&ii, x, y, scale) == n_stages {
                        hits.push(Region::new(x as i32, y as i32, win_w as i32, win_h as i32));
                    }
                }
            }
            scale *= self.config.scale_factor;
        }
        hits
    }

    /// Grouped, clamped and ordered detections for a luma image.
    pub fn detect_gray(&self, gray: &GrayImage) -> Vec<Region> {
        let hits = self.raw_hits(gray);
        let mut faces: Vec<Region> = self
            .merger
            .merge(&hits)
            .into_iter()
            .filter_map(|r| r.clamp_to(gray.width(), gray.height()))
            .collect();
        faces.sort_by_key(|r| (r.y, r.x, r.width, r.height));
        log::debug!("{} raw hits merged into {} faces", hits.len(), faces.len());
        faces
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>, DetectionError> {
        if frame.is_empty() {
            return Err(DetectionError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }
        let gray = image_convert::to_gray(frame)?;
        Ok(self.detect_gray(&gray))
    }
}
