use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::benchmark::recorder::{BenchmarkSink, FileBenchmarkRecorder, NullBenchmarkSink};
use crate::capture::domain::camera::Camera;
use crate::capture::infrastructure::channel_pacer::ChannelPacer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::cascade::CascadeError;
use crate::detection::infrastructure::cascade_detector::{CascadeDetector, DetectorConfig};
use crate::normalization::face_normalizer::{FaceNormalizer, NormalizeError};
use crate::pipeline::capture_stage::CaptureStage;
use crate::pipeline::detection_stage::DetectionStage;
use crate::pipeline::intermediate_results::IntermediateResults;
use crate::pipeline::normalization_stage::NormalizationStage;
use crate::pipeline::pipeline_runner::{CancelHandle, PipelineStages};
use crate::pipeline::recognition_stage::RecognitionStage;
use crate::recognition::domain::classifier_model::ClassifierModel;
use crate::recognition::infrastructure::classifier_cache::ClassifierCache;
use crate::recognition::infrastructure::training_corpus::TrainingError;
use crate::shared::clock::Clock;
use crate::shared::image_writer::ImageFileWriter;
use crate::shared::settings::PipelineSettings;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cannot load face detector: {0}")]
    Detector(#[from] CascadeError),
    #[error(transparent)]
    Normalizer(#[from] NormalizeError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(
        "faces are normalized to {}x{} but the classifier was trained on {}x{}",
        configured.0, configured.1, trained.0, trained.1
    )]
    FaceSizeMismatch {
        configured: (u32, u32),
        trained: (u32, u32),
    },
}

/// A fully wired run plus the handles the caller keeps.
pub struct Pipeline {
    pub stages: PipelineStages,
    pub cancel: CancelHandle,
    pub classifier: Arc<ClassifierCache>,
    face_size: (u32, u32),
}

impl Pipeline {
    /// Trains the classifier if it is not ready yet and checks it accepts
    /// the faces the normalization stage produces.
    pub fn prepare_classifier(&self) -> Result<Arc<ClassifierModel>, BuildError> {
        let model = self.classifier.get()?;
        check_face_size(self.face_size, &model)?;
        Ok(model)
    }
}

fn check_face_size(configured: (u32, u32), model: &ClassifierModel) -> Result<(), BuildError> {
    let trained = model.face_size();
    if trained != configured {
        return Err(BuildError::FaceSizeMismatch {
            configured,
            trained,
        });
    }
    Ok(())
}

/// Wires every stage from one settings snapshot.
///
/// The camera comes from the caller so the same wiring serves a live device
/// and a replayed directory. Benchmark logs are best effort: when the log
/// directory cannot be opened the run proceeds without them.
pub struct PipelineBuilder<'a> {
    settings: &'a PipelineSettings,
    clock: Arc<dyn Clock>,
    detector: Option<Arc<dyn FaceDetector>>,
    classifier: Option<Arc<ClassifierCache>>,
    benchmark: Option<Arc<dyn BenchmarkSink>>,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(settings: &'a PipelineSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            detector: None,
            classifier: None,
            benchmark: None,
        }
    }

    /// Replaces the cascade detector named in the settings.
    pub fn with_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Shares an existing classifier instead of training from the corpus.
    pub fn with_classifier(mut self, classifier: Arc<ClassifierCache>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_benchmark(mut self, sink: Arc<dyn BenchmarkSink>) -> Self {
        self.benchmark = Some(sink);
        self
    }

    pub fn build(self, camera: Box<dyn Camera>) -> Result<Pipeline, BuildError> {
        let settings = self.settings;
        let clock = self.clock;

        let detector = match self.detector {
            Some(detector) => detector,
            None => Arc::new(CascadeDetector::from_path(
                &settings.cascade_definition_path,
                DetectorConfig::from_settings(settings),
            )?),
        };
        let normalizer = FaceNormalizer::new(settings.face_width, settings.face_height)?;
        let classifier = self.classifier.unwrap_or_else(|| {
            Arc::new(ClassifierCache::from_corpus_dir(
                settings.recognizer_algorithm,
                settings.training_corpus_path.clone(),
            ))
        });
        if classifier.is_ready() {
            check_face_size(settings.face_size(), &*classifier.get()?)?;
        }
        let benchmark = self
            .benchmark
            .unwrap_or_else(|| open_benchmark(settings));
        let intermediate = settings.save_intermediate_results.then(|| {
            Arc::new(IntermediateResults::new(
                settings.intermediate_dir.clone(),
                Box::new(ImageFileWriter::new()),
                clock.clone(),
            ))
        });

        let pacer = ChannelPacer::new();
        let cancel = CancelHandle::new(Some(pacer.interrupt_handle()));

        let mut capture = CaptureStage::new(
            camera,
            Box::new(pacer),
            Duration::from_millis(settings.sample_interval_ms),
            clock.clone(),
            benchmark.clone(),
        );
        let detection = DetectionStage::new(detector, clock.clone(), benchmark.clone());
        let mut normalization = NormalizationStage::new(normalizer, clock.clone());
        let mut recognition = RecognitionStage::new(
            classifier.clone(),
            settings.match_policy(),
            clock,
            benchmark,
        );
        if let Some(results) = intermediate {
            capture = capture.with_intermediate_results(results.clone());
            normalization = normalization.with_intermediate_results(results.clone());
            recognition = recognition.with_intermediate_results(results);
        }

        Ok(Pipeline {
            stages: PipelineStages {
                capture,
                detection,
                normalization,
                recognition,
            },
            cancel,
            classifier,
            face_size: settings.face_size(),
        })
    }
}

fn open_benchmark(settings: &PipelineSettings) -> Arc<dyn BenchmarkSink> {
    match FileBenchmarkRecorder::create(&settings.benchmark_log_dir) {
        Ok(recorder) => Arc::new(recorder),
        Err(e) => {
            log::warn!("Benchmark logging disabled: {e}");
            Arc::new(NullBenchmarkSink)
        }
    }
}
