use image::GrayImage;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::recognition::domain::classifier_model::FaceClassifier;
use crate::recognition::domain::prediction::Prediction;
use crate::recognition::infrastructure::linalg::symmetric_eigen;
use crate::recognition::infrastructure::training_corpus::TrainingCorpus;

/// Eigenvalues at or below this fraction of the largest are treated as
/// numerical noise.
const RELATIVE_EIGEN_TOLERANCE: f64 = 1e-10;

/// Affine projection `x -> (x - mean) · basis` onto `basis.ncols()` axes.
#[derive(Clone, Debug)]
pub struct Subspace {
    mean: Array1<f64>,
    basis: Array2<f64>,
}

pub fn image_row(img: &GrayImage) -> Array1<f64> {
    img.as_raw().iter().map(|&v| v as f64).collect()
}

/// One flattened image per row, in corpus order.
pub fn sample_matrix(corpus: &TrainingCorpus) -> Array2<f64> {
    let (w, h) = corpus.size();
    let d = (w * h) as usize;
    let mut data = Array2::<f64>::zeros((corpus.len(), d));
    for (mut row, sample) in data.axis_iter_mut(Axis(0)).zip(corpus.samples()) {
        row.assign(&image_row(&sample.image));
    }
    data
}

impl Subspace {
    /// Principal components of the rows of `data`, at most `max_components`.
    ///
    /// Uses the `n x n` Gram matrix instead of the `d x d` covariance, so the
    /// cost depends on the number of samples rather than on pixels.
    pub fn pca(data: &Array2<f64>, max_components: usize) -> Self {
        let n = data.nrows().max(1);
        let mean = data.sum_axis(Axis(0)) / n as f64;
        let centered = data - &mean;
        let gram = centered.dot(&centered.t());
        let (values, vectors) = symmetric_eigen(&gram);

        let tolerance = values.first().copied().unwrap_or(0.0).abs() * RELATIVE_EIGEN_TOLERANCE;
        let kept: Vec<usize> = (0..values.len())
            .filter(|&i| values[i] > tolerance)
            .take(max_components)
            .collect();

        let mut basis = Array2::<f64>::zeros((data.ncols(), kept.len()));
        for (dst, &i) in kept.iter().enumerate() {
            let axis = centered.t().dot(&vectors.column(i));
            let norm = axis.dot(&axis).sqrt();
            basis.column_mut(dst).assign(&(axis / norm));
        }
        Self { mean, basis }
    }

    pub fn dim(&self) -> usize {
        self.basis.ncols()
    }

    pub fn project(&self, sample: ArrayView1<f64>) -> Array1<f64> {
        (&sample - &self.mean).dot(&self.basis)
    }

    pub fn project_rows(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean).dot(&self.basis)
    }

    /// Follows this projection with a linear map `inner` (`dim() x k`).
    pub fn compose(self, inner: &Array2<f64>) -> Self {
        Self {
            basis: self.basis.dot(inner),
            mean: self.mean,
        }
    }
}

/// Nearest training sample in a projected space, by Euclidean distance.
pub struct NearestProjection {
    subspace: Subspace,
    projections: Array2<f64>,
    labels: Vec<i32>,
}

impl NearestProjection {
    pub fn new(subspace: Subspace, data: &Array2<f64>, labels: Vec<i32>) -> Self {
        let projections = subspace.project_rows(data);
        Self {
            subspace,
            projections,
            labels,
        }
    }

    pub fn dim(&self) -> usize {
        self.subspace.dim()
    }
}

impl FaceClassifier for NearestProjection {
    fn predict(&self, face: &GrayImage) -> Prediction {
        let query = self.subspace.project(image_row(face).view());
        self.projections
            .axis_iter(Axis(0))
            .zip(&self.labels)
            .map(|(p, &label)| {
                let diff = &p - &query;
                (label, diff.dot(&diff).sqrt())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(label, distance)| Prediction::new(label, distance))
            .unwrap_or(Prediction::new(-1, f64::MAX))
    }
}
