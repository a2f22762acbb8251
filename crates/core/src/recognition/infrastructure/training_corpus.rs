use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use thiserror::Error;

use crate::recognition::domain::algorithm::RecognizerAlgorithm;
use crate::shared::constants::TRAINING_EXTENSIONS;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("training corpus {0} does not exist or is not a directory")]
    MissingCorpus(PathBuf),
    #[error("cannot list training corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("training corpus {0} contains no usable images")]
    EmptyCorpus(PathBuf),
    #[error("{path} is {actual:?}, expected {expected:?} like the first image")]
    SizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{algorithm} needs at least {needed} distinct labels, corpus has {found}")]
    TooFewLabels {
        algorithm: RecognizerAlgorithm,
        needed: usize,
        found: usize,
    },
    #[error("training images of {width}x{height} are too small, need at least {min}x{min}")]
    ImageTooSmall { width: u32, height: u32, min: u32 },
    #[error("degenerate training data: {0}")]
    Degenerate(String),
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

/// One decoded training image and its label.
#[derive(Clone, Debug)]
pub struct LabeledImage {
    pub label: i32,
    pub image: GrayImage,
}

/// Same-size grayscale images with integer labels.
#[derive(Clone, Debug)]
pub struct TrainingCorpus {
    samples: Vec<LabeledImage>,
    size: (u32, u32),
}

/// Label encoded in a training file name: the non-negative integer before
/// the first `-` (`"7-smile.png"` is label 7).
pub fn parse_label(file_name: &str) -> Option<i32> {
    let (prefix, _) = file_name.split_once('-')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

fn has_training_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            TRAINING_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

impl TrainingCorpus {
    /// Loads every labelled image in `dir`, in file name order.
    ///
    /// Files with an unparsable label or undecodable content are skipped
    /// with a warning. The first image fixes the corpus size.
    pub fn load_dir(dir: &Path) -> Result<Self, TrainingError> {
        if !dir.is_dir() {
            return Err(TrainingError::MissingCorpus(dir.to_path_buf()));
        }
        let io_err = |source: std::io::Error| TrainingError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_training_extension(p))
            .collect();
        paths.sort();

        let mut samples = Vec::with_capacity(paths.len());
        let mut size = None;
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let Some(label) = parse_label(name) else {
                log::warn!("Skipping {}: no numeric label prefix", path.display());
                continue;
            };
            let image = match image::open(&path) {
                Ok(img) => img.to_luma8(),
                Err(e) => {
                    log::warn!("Skipping {}: {e}", path.display());
                    continue;
                }
            };
            let expected = *size.get_or_insert(image.dimensions());
            if image.dimensions() != expected {
                return Err(TrainingError::SizeMismatch {
                    path,
                    expected,
                    actual: image.dimensions(),
                });
            }
            samples.push(LabeledImage { label, image });
        }

        let Some(size) = size else {
            return Err(TrainingError::EmptyCorpus(dir.to_path_buf()));
        };
        log::info!(
            "Loaded {} training images ({}x{}) from {}",
            samples.len(),
            size.0,
            size.1,
            dir.display()
        );
        Ok(Self { samples, size })
    }

    /// Builds a corpus from in-memory images. All must share one size.
    pub fn from_samples(samples: Vec<LabeledImage>) -> Result<Self, TrainingError> {
        let first = samples
            .first()
            .ok_or_else(|| TrainingError::EmptyCorpus(PathBuf::from("<memory>")))?;
        let size = first.image.dimensions();
        if let Some((i, bad)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.image.dimensions() != size)
        {
            return Err(TrainingError::SizeMismatch {
                path: PathBuf::from(format!("<memory #{i}>")),
                expected: size,
                actual: bad.image.dimensions(),
            });
        }
        Ok(Self { samples, size })
    }

    pub fn samples(&self) -> &[LabeledImage] {
        &self.samples
    }

    pub fn labels(&self) -> BTreeSet<i32> {
        self.samples.iter().map(|s| s.label).collect()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Deterministic labelled corpora for recognizer tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Oriented sine gratings, one orientation and frequency per label,
    /// with a few grey levels of per-sample noise.
    pub(crate) fn grating(label: i32, sample: u32, w: u32, h: u32) -> GrayImage {
        let k = label as f64;
        let (fx, fy) = (0.35 + 0.22 * k, 0.9 - 0.17 * k);
        GrayImage::from_fn(w, h, |x, y| {
            let seed = x.wrapping_mul(73_856_093)
                ^ y.wrapping_mul(19_349_663)
                ^ sample.wrapping_mul(83_492_791)
                ^ (label as u32).wrapping_mul(2_654_435_761);
            let noise = (seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) >> 16) % 7;
            let v = 128.0 + 90.0 * (fx * x as f64 + fy * y as f64).sin() + noise as f64 - 3.0;
            image::Luma([v.round().clamp(0.0, 255.0) as u8])
        })
    }

    pub(crate) fn corpus(labels: &[i32], per_label: u32, w: u32, h: u32) -> TrainingCorpus {
        let samples = labels
            .iter()
            .flat_map(|&label| {
                (0..per_label).map(move |s| LabeledImage {
                    label,
                    image: grating(label, s, w, h),
                })
            })
            .collect();
        TrainingCorpus::from_samples(samples).unwrap()
    }
}
