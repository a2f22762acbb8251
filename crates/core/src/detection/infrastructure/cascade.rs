//! Boosted Haar-like cascade: the serialized definition and window
//! evaluation.
//!
//! A definition is a JSON document:
//!
//! ```json
//! { "window": [24, 24],
//!   "stages": [ { "threshold": -1.2,
//!                 "classifiers": [ { "feature": [[3, 7, 14, 4, -1.0], [3, 9, 14, 2, 2.0]],
//!                                    "threshold": 0.004, "left": 0.03, "right": -0.8 } ] } ] }
//! ```
//!
//! OpenCV's XML cascades load into the same model, see [`opencv_cascade`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::opencv_cascade;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("cannot read cascade definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid cascade definition: {0}")]
    Invalid(String),
}

/// One weighted rectangle `[x, y, w, h, weight]` in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRect(pub u32, pub u32, pub u32, pub u32, pub f64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeakClassifier {
    pub feature: Vec<FeatureRect>,
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cascade {
    pub window: [u32; 2],
    pub stages: Vec<CascadeStage>,
}

impl Cascade {
    /// Reads a JSON definition or an OpenCV XML cascade, told apart by the
    /// first character of the file.
    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        let text = fs::read_to_string(path).map_err(|e| CascadeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if text.trim_start_matches('\u{feff}').trim_start().starts_with('<') {
            opencv_cascade::parse(&text)
        } else {
            Self::from_json(&text)
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CascadeError> {
        let cascade: Self = serde_json::from_str(json)?;
        cascade.validate()?;
        Ok(cascade)
    }

    pub fn validate(&self) -> Result<(), CascadeError> {
        let [ww, wh] = self.window;
        if ww == 0 || wh == 0 {
            return Err(CascadeError::Invalid(format!(
                "window must be positive, got {ww}x{wh}"
            )));
        }
        if self.stages.is_empty() {
            return Err(CascadeError::Invalid("no stages".into()));
        }
        for (si, stage) in self.stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(CascadeError::Invalid(format!("stage {si} has no classifiers")));
            }
            for (ci, weak) in stage.classifiers.iter().enumerate() {
                if !(1..=3).contains(&weak.feature.len()) {
                    return Err(CascadeError::Invalid(format!(
                        "stage {si} classifier {ci}: feature needs 1 to 3 rectangles, got {}",
                        weak.feature.len()
                    )));
                }
                for &FeatureRect(x, y, w, h, _) in &weak.feature {
                    let outside = |origin: u32, extent: u32, limit: u32| {
                        origin.checked_add(extent).map_or(true, |end| end > limit)
                    };
                    if w == 0 || h == 0 || outside(x, w, ww) || outside(y, h, wh) {
                        return Err(CascadeError::Invalid(format!(
                            "stage {si} classifier {ci}: rectangle ({x},{y},{w},{h}) \
                             outside {ww}x{wh} window"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window[0], self.window[1])
    }

    /// Runs the stages on one window, stopping at the first failing stage.
    ///
    /// `(x, y)` is the window's origin and `scale` the factor from the
    /// definition's window to the scanned one. The caller guarantees the
    /// scaled window lies inside the integral image. Returns the number of
    /// stages passed; the window is a hit when that equals
    /// `self.stages.len()`.
    pub fn stages_passed(&self, ii: &IntegralImage, x: usize, y: usize, scale: f64) -> usize {
        let win_w = scaled(self.window[0], scale);
        let win_h = scaled(self.window[1], scale);
        let area = (win_w * win_h) as f64;

        let mean = ii.rect_sum(x, y, win_w, win_h) / area;
        let variance = ii.rect_sq_sum(x, y, win_w, win_h) / area - mean * mean;
        let norm = area * variance.max(0.0).sqrt().max(1.0);

        for (passed, stage) in self.stages.iter().enumerate() {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| {
                    let value: f64 = weak
                        .feature
                        .iter()
                        .map(|&FeatureRect(rx, ry, rw, rh, weight)| {
                            // rounding must not push a rectangle past the window
                            let sx = scaled(rx, scale).min(win_w);
                            let sy = scaled(ry, scale).min(win_h);
                            let sw = scaled(rw, scale).min(win_w - sx);
                            let sh = scaled(rh, scale).min(win_h - sy);
                            weight * ii.rect_sum(x + sx, y + sy, sw, sh)
                        })
                        .sum::<f64>()
                        / norm;
                    if value < weak.threshold {
                        weak.left
                    } else {
                        weak.right
                    }
                })
                .sum();
            if score < stage.threshold {
                return passed;
            }
        }
        self.stages.len()
    }
}

pub(crate) fn scaled(v: u32, scale: f64) -> usize {
    (v as f64 * scale).round() as usize
}
