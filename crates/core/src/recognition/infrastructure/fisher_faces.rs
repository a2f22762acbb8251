use std::collections::BTreeMap;

use ndarray::{s, Array1, Array2, Axis};

use crate::recognition::infrastructure::linalg::{cholesky, invert_lower, symmetric_eigen};
use crate::recognition::infrastructure::subspace::{sample_matrix, NearestProjection, Subspace};
use crate::recognition::infrastructure::training_corpus::{TrainingCorpus, TrainingError};

/// Relative ridge added to the within-class scatter before whitening.
const SCATTER_RIDGE: f64 = 1e-6;

/// Fits the discriminant subspace: PCA down to `n - c` axes, then the
/// `c - 1` Fisher discriminants of the projected samples.
///
/// The generalized problem `Sb w = λ Sw w` is reduced to a symmetric one by
/// whitening with the Cholesky factor of `Sw`.
pub fn train(corpus: &TrainingCorpus) -> Result<NearestProjection, TrainingError> {
    let labels: Vec<i32> = corpus.samples().iter().map(|s| s.label).collect();
    let n = labels.len();
    let classes = corpus.labels().len();

    let data = sample_matrix(corpus);
    let pca = Subspace::pca(&data, n.saturating_sub(classes).max(1));
    let projected = pca.project_rows(&data);
    let m = projected.ncols();
    if m == 0 {
        return Err(TrainingError::Degenerate(
            "all training images are identical".into(),
        ));
    }

    let overall = projected.sum_axis(Axis(0)) / n as f64;
    let mut class_sums: BTreeMap<i32, (Array1<f64>, usize)> = BTreeMap::new();
    for (row, &label) in projected.axis_iter(Axis(0)).zip(&labels) {
        let entry = class_sums
            .entry(label)
            .or_insert_with(|| (Array1::zeros(m), 0));
        entry.0 += &row;
        entry.1 += 1;
    }
    let class_means: BTreeMap<i32, (Array1<f64>, usize)> = class_sums
        .into_iter()
        .map(|(label, (sum, count))| (label, (sum / count as f64, count)))
        .collect();

    let mut within = Array2::<f64>::zeros((m, m));
    for (row, label) in projected.axis_iter(Axis(0)).zip(&labels) {
        let d = &row - &class_means[label].0;
        within += &outer(&d, &d);
    }
    let mut between = Array2::<f64>::zeros((m, m));
    for (mean, count) in class_means.values() {
        let d = mean - &overall;
        between += &(outer(&d, &d) * *count as f64);
    }

    let ridge = SCATTER_RIDGE * (within.diag().sum() / m as f64).max(1.0);
    within.diag_mut().mapv_inplace(|v| v + ridge);
    let l = cholesky(&within).ok_or_else(|| {
        TrainingError::Degenerate("within-class scatter is not positive definite".into())
    })?;
    let l_inv = invert_lower(&l);
    let whitened = l_inv.dot(&between).dot(&l_inv.t());
    let symmetric = (&whitened + &whitened.t()) * 0.5;
    let (_, vectors) = symmetric_eigen(&symmetric);

    let k = (classes - 1).clamp(1, m);
    let discriminants = l_inv.t().dot(&vectors.slice(s![.., ..k]));
    log::debug!("Discriminant subspace: {m} PCA axes, {k} discriminants");

    Ok(NearestProjection::new(pca.compose(&discriminants), &data, labels))
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let col = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    col.dot(&row)
}
