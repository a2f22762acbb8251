use std::path::Path;

use crate::recognition::domain::algorithm::RecognizerAlgorithm;
use crate::recognition::domain::classifier_model::{ClassifierModel, FaceClassifier};
use crate::recognition::infrastructure::lbph::LbphClassifier;
use crate::recognition::infrastructure::training_corpus::{TrainingCorpus, TrainingError};
use crate::recognition::infrastructure::{eigen_faces, fisher_faces};

/// Fits one [`RecognizerAlgorithm`] to a labelled corpus.
#[derive(Clone, Debug)]
pub struct ClassifierTrainer {
    algorithm: RecognizerAlgorithm,
    components: Option<usize>,
}

impl ClassifierTrainer {
    pub fn new(algorithm: RecognizerAlgorithm) -> Self {
        Self {
            algorithm,
            components: None,
        }
    }

    /// Caps the variance subspace dimension. Ignored by the other families.
    pub fn with_components(mut self, components: usize) -> Self {
        self.components = Some(components);
        self
    }

    pub fn algorithm(&self) -> RecognizerAlgorithm {
        self.algorithm
    }

    pub fn train(&self, corpus: &TrainingCorpus) -> Result<ClassifierModel, TrainingError> {
        let labels = corpus.labels();
        let needed = self.algorithm.min_labels();
        if labels.len() < needed {
            return Err(TrainingError::TooFewLabels {
                algorithm: self.algorithm,
                needed,
                found: labels.len(),
            });
        }

        let backend: Box<dyn FaceClassifier> = match self.algorithm {
            RecognizerAlgorithm::VarianceSubspace => {
                Box::new(eigen_faces::train(corpus, self.components))
            }
            RecognizerAlgorithm::DiscriminantSubspace => Box::new(fisher_faces::train(corpus)?),
            RecognizerAlgorithm::LocalBinaryHistogram => Box::new(LbphClassifier::train(corpus)?),
        };

        log::info!(
            "Trained {} on {} images, {} labels",
            self.algorithm,
            corpus.len(),
            labels.len()
        );
        Ok(ClassifierModel::new(
            self.algorithm,
            labels,
            corpus.size(),
            backend,
        ))
    }

    pub fn train_dir(&self, dir: &Path) -> Result<ClassifierModel, TrainingError> {
        let corpus = TrainingCorpus::load_dir(dir)?;
        self.train(&corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::infrastructure::training_corpus::fixtures;
    use rstest::rstest;
    use std::collections::BTreeSet;

    #[rstest]
    #[case(RecognizerAlgorithm::VarianceSubspace)]
    #[case(RecognizerAlgorithm::DiscriminantSubspace)]
    #[case(RecognizerAlgorithm::LocalBinaryHistogram)]
    fn test_training_image_predicts_own_label(#[case] algorithm: RecognizerAlgorithm) {
        let corpus = fixtures::corpus(&[0, 1, 2], 3, 16, 16);
        let model = ClassifierTrainer::new(algorithm).train(&corpus).unwrap();
        assert_eq!(model.algorithm(), algorithm);
        assert_eq!(model.labels(), &BTreeSet::from([0, 1, 2]));
        assert_eq!(model.face_size(), (16, 16));
        for sample in corpus.samples() {
            assert_eq!(model.predict(&sample.image).unwrap().label, sample.label);
        }
    }

    #[test]
    fn test_discriminant_needs_two_labels() {
        let corpus = fixtures::corpus(&[5], 3, 16, 16);
        let err = ClassifierTrainer::new(RecognizerAlgorithm::DiscriminantSubspace)
            .train(&corpus)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainingError::TooFewLabels {
                needed: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_single_label_variance_subspace() {
        let corpus = fixtures::corpus(&[5], 3, 16, 16);
        let model = ClassifierTrainer::new(RecognizerAlgorithm::VarianceSubspace)
            .with_components(1)
            .train(&corpus)
            .unwrap();
        assert_eq!(model.predict(&corpus.samples()[0].image).unwrap().label, 5);
    }

    #[test]
    fn test_train_dir_from_files() {
        let dir = tempfile::tempdir().unwrap();
        for label in [3, 4] {
            for s in 0..2 {
                fixtures::grating(label, s, 16, 16)
                    .save(dir.path().join(format!("{label}-{s}.png")))
                    .unwrap();
            }
        }
        let model = ClassifierTrainer::new(RecognizerAlgorithm::LocalBinaryHistogram)
            .train_dir(dir.path())
            .unwrap();
        assert_eq!(model.labels(), &BTreeSet::from([3, 4]));
    }

    #[test]
    fn test_train_dir_missing() {
        let err = ClassifierTrainer::new(RecognizerAlgorithm::VarianceSubspace)
            .train_dir(Path::new("/nonexistent/faces"))
            .unwrap_err();
        assert!(matches!(err, TrainingError::MissingCorpus(_)));
    }
}
