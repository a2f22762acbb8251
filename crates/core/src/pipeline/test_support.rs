//! Scripted collaborators for stage and runner tests.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::GrayImage;

use crate::capture::domain::camera::{Camera, CameraError};
use crate::capture::domain::pacer::{Pacer, WaitOutcome};
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::recognition::domain::algorithm::RecognizerAlgorithm;
use crate::recognition::domain::classifier_model::{ClassifierModel, FaceClassifier};
use crate::recognition::domain::prediction::Prediction;
use crate::recognition::infrastructure::classifier_cache::ClassifierCache;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// Plays back a fixed script, then repeats the last good frame.
pub struct ScriptedCamera {
    script: VecDeque<Result<Frame, CameraError>>,
    last: Option<Frame>,
    busy_once: bool,
    started: bool,
    calls: CallLog,
}

impl ScriptedCamera {
    pub fn new(script: Vec<Result<Frame, CameraError>>) -> Self {
        Self {
            script: script.into(),
            last: None,
            busy_once: false,
            started: false,
            calls: Arc::default(),
        }
    }

    pub fn busy_once(mut self) -> Self {
        self.busy_once = true;
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Camera for ScriptedCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        self.log("start");
        if std::mem::take(&mut self.busy_once) {
            return Err(CameraError::Busy("scripted".into()));
        }
        self.started = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        self.log("grab");
        if !self.started {
            return Err(CameraError::NotStarted);
        }
        match self.script.pop_front() {
            Some(Ok(frame)) => {
                self.last = Some(frame.clone());
                Ok(frame)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .clone()
                .ok_or_else(|| CameraError::Grab("script exhausted".into())),
        }
    }

    fn stop(&mut self) {
        self.log("stop");
        self.started = false;
    }
}

/// Never sleeps.
pub struct InstantPacer;

impl Pacer for InstantPacer {
    fn wait(&self, _interval: Duration) -> WaitOutcome {
        WaitOutcome::Elapsed
    }
}

/// Returns the same boxes for every frame.
pub struct FixedDetector(pub Vec<Region>);

impl FaceDetector for FixedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Region>, DetectionError> {
        Ok(self.0.clone())
    }
}

/// Answers from a queue of predictions, repeating the last one.
pub struct ScriptedClassifier {
    predictions: Mutex<VecDeque<Prediction>>,
    last: Mutex<Prediction>,
}

impl ScriptedClassifier {
    pub fn new(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions: Mutex::new(predictions.into()),
            last: Mutex::new(Prediction::new(-1, f64::MAX)),
        }
    }
}

impl FaceClassifier for ScriptedClassifier {
    fn predict(&self, _face: &GrayImage) -> Prediction {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.predictions.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }
}

pub fn scripted_cache(face_size: (u32, u32), predictions: Vec<Prediction>) -> Arc<ClassifierCache> {
    let model = ClassifierModel::new(
        RecognizerAlgorithm::VarianceSubspace,
        BTreeSet::from([3, 7]),
        face_size,
        Box::new(ScriptedClassifier::new(predictions)),
    );
    Arc::new(ClassifierCache::with_model(model))
}
