use image::GrayImage;

use crate::recognition::domain::classifier_model::FaceClassifier;
use crate::recognition::domain::prediction::Prediction;
use crate::recognition::infrastructure::training_corpus::{TrainingCorpus, TrainingError};

pub const GRID_X: usize = 8;
pub const GRID_Y: usize = 8;
const BINS: usize = 256;

/// Smallest image side that still gives every grid cell one LBP pixel.
pub const MIN_SIDE: u32 = GRID_X as u32 + 2;

/// Local binary pattern histograms compared by chi-square distance.
pub struct LbphClassifier {
    histograms: Vec<Vec<f64>>,
    labels: Vec<i32>,
}

impl LbphClassifier {
    pub fn train(corpus: &TrainingCorpus) -> Result<Self, TrainingError> {
        let (w, h) = corpus.size();
        if w < MIN_SIDE || h < MIN_SIDE {
            return Err(TrainingError::ImageTooSmall {
                width: w,
                height: h,
                min: MIN_SIDE,
            });
        }
        let histograms = corpus
            .samples()
            .iter()
            .map(|s| spatial_histogram(&s.image))
            .collect();
        let labels = corpus.samples().iter().map(|s| s.label).collect();
        Ok(Self { histograms, labels })
    }
}

impl FaceClassifier for LbphClassifier {
    fn predict(&self, face: &GrayImage) -> Prediction {
        let query = spatial_histogram(face);
        self.histograms
            .iter()
            .zip(&self.labels)
            .map(|(hist, &label)| (label, chi_square(hist, &query)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(label, distance)| Prediction::new(label, distance))
            .unwrap_or(Prediction::new(-1, f64::MAX))
    }
}

/// Radius-1, 8-neighbour LBP codes of the interior pixels.
///
/// Bit 7 is the top-left neighbour, continuing clockwise; a bit is set
/// when the neighbour is at least as bright as the centre.
pub fn lbp_codes(img: &GrayImage) -> (Vec<u8>, usize, usize) {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w < 3 || h < 3 {
        return (Vec::new(), 0, 0);
    }
    let px = img.as_raw();
    let at = |x: usize, y: usize| px[y * w + x];
    let (lw, lh) = (w - 2, h - 2);
    let mut codes = Vec::with_capacity(lw * lh);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = at(x, y);
            let neighbours = [
                at(x - 1, y - 1),
                at(x, y - 1),
                at(x + 1, y - 1),
                at(x + 1, y),
                at(x + 1, y + 1),
                at(x, y + 1),
                at(x - 1, y + 1),
                at(x - 1, y),
            ];
            let code = neighbours
                .iter()
                .fold(0u8, |acc, &n| (acc << 1) | u8::from(n >= c));
            codes.push(code);
        }
    }
    (codes, lw, lh)
}

/// Concatenated, per-cell normalised LBP histograms over an 8x8 grid.
pub fn spatial_histogram(img: &GrayImage) -> Vec<f64> {
    let (codes, lw, lh) = lbp_codes(img);
    let mut hist = vec![0.0; GRID_X * GRID_Y * BINS];
    let (cw, ch) = (lw / GRID_X, lh / GRID_Y);
    if cw == 0 || ch == 0 {
        return hist;
    }
    let norm = 1.0 / (cw * ch) as f64;
    for gy in 0..GRID_Y {
        for gx in 0..GRID_X {
            let cell = &mut hist[(gy * GRID_X + gx) * BINS..][..BINS];
            for y in gy * ch..(gy + 1) * ch {
                for x in gx * cw..(gx + 1) * cw {
                    cell[codes[y * lw + x] as usize] += norm;
                }
            }
        }
    }
    hist
}

/// Symmetric chi-square distance `Σ 2 (a - b)² / (a + b)`.
pub fn chi_square(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| *x + *y > 0.0)
        .map(|(x, y)| 2.0 * (x - y).powi(2) / (x + y))
        .sum()
}
