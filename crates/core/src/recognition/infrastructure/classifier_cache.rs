use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::recognition::domain::algorithm::RecognizerAlgorithm;
use crate::recognition::domain::classifier_model::ClassifierModel;
use crate::recognition::infrastructure::classifier_trainer::ClassifierTrainer;
use crate::recognition::infrastructure::training_corpus::TrainingError;

type TrainFn = dyn Fn() -> Result<ClassifierModel, TrainingError> + Send + Sync;

/// Owns the process-wide classifier and trains it on first use.
///
/// Training runs at most once. Callers arriving while it runs block until
/// it finishes, then every caller sees the same model or the same error.
pub struct ClassifierCache {
    cell: OnceLock<Result<Arc<ClassifierModel>, String>>,
    train: Option<Box<TrainFn>>,
}

impl ClassifierCache {
    pub fn new<F>(train: F) -> Self
    where
        F: Fn() -> Result<ClassifierModel, TrainingError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            train: Some(Box::new(train)),
        }
    }

    /// Lazily trains `algorithm` on the images in `corpus_dir`.
    pub fn from_corpus_dir(algorithm: RecognizerAlgorithm, corpus_dir: PathBuf) -> Self {
        Self::new(move || ClassifierTrainer::new(algorithm).train_dir(&corpus_dir))
    }

    /// Wraps an already trained model.
    pub fn with_model(model: ClassifierModel) -> Self {
        Self {
            cell: OnceLock::from(Ok(Arc::new(model))),
            train: None,
        }
    }

    pub fn get(&self) -> Result<Arc<ClassifierModel>, TrainingError> {
        let result = self.cell.get_or_init(|| match &self.train {
            Some(train) => {
                log::info!("Training classifier");
                train().map(Arc::new).map_err(|e| {
                    log::error!("Classifier training failed: {e}");
                    e.to_string()
                })
            }
            None => Err("no model and no trainer configured".to_string()),
        });
        result.clone().map_err(TrainingError::Unavailable)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}
