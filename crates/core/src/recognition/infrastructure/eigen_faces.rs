use crate::recognition::infrastructure::subspace::{sample_matrix, NearestProjection, Subspace};
use crate::recognition::infrastructure::training_corpus::TrainingCorpus;

/// Fits the variance subspace: PCA over the corpus, keeping up to
/// `components` axes (all `n - 1` when `None`).
pub fn train(corpus: &TrainingCorpus, components: Option<usize>) -> NearestProjection {
    let data = sample_matrix(corpus);
    let limit = corpus.len().saturating_sub(1).max(1);
    let wanted = components.map_or(limit, |c| c.clamp(1, limit));
    let pca = Subspace::pca(&data, wanted);
    log::debug!("Variance subspace keeps {} of {} requested components", pca.dim(), wanted);
    let labels = corpus.samples().iter().map(|s| s.label).collect();
    NearestProjection::new(pca, &data, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::classifier_model::FaceClassifier;
    use crate::recognition::infrastructure::training_corpus::fixtures;

    #[test]
    fn test_keeps_at_most_n_minus_one_components() {
        let corpus = fixtures::corpus(&[1, 2, 3], 2, 10, 10);
        assert_eq!(train(&corpus, None).dim(), 5);
        assert_eq!(train(&corpus, Some(2)).dim(), 2);
        assert_eq!(train(&corpus, Some(50)).dim(), 5);
    }

    #[test]
    fn test_unseen_sample_matches_its_grating() {
        let corpus = fixtures::corpus(&[1, 2, 3], 3, 12, 12);
        let model = train(&corpus, None);
        let unseen = fixtures::grating(3, 99, 12, 12);
        assert_eq!(model.predict(&unseen).label, 3);
    }
}
