use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::algorithm::RecognizerAlgorithm;
use crate::recognition::domain::prediction::{MatchPolicy, ScoreDirection};
use crate::shared::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_FACE_HEIGHT, DEFAULT_FACE_WIDTH, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_WIDTH, DEFAULT_MIN_NEIGHBOURS, DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_SCALE_FACTOR,
    DEFAULT_WINDOW_STEP,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings document: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Configuration snapshot handed to every stage.
///
/// Keys use camelCase in the JSON document; enum values use kebab-case,
/// so an unknown algorithm name is rejected while loading, before any
/// training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineSettings {
    pub frame_width: u32,
    pub frame_height: u32,
    pub sample_interval_ms: u64,
    pub save_intermediate_results: bool,
    pub intermediate_dir: PathBuf,
    pub face_width: u32,
    pub face_height: u32,
    pub cascade_definition_path: PathBuf,
    pub scale_factor: f64,
    pub min_neighbours: usize,
    pub window_step: u32,
    pub training_corpus_path: PathBuf,
    pub recognizer_algorithm: RecognizerAlgorithm,
    pub confidence_threshold: f64,
    /// Overrides the algorithm's natural score direction when set.
    pub match_direction: Option<ScoreDirection>,
    pub benchmark_log_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            save_intermediate_results: false,
            intermediate_dir: PathBuf::from("intermediate"),
            face_width: DEFAULT_FACE_WIDTH,
            face_height: DEFAULT_FACE_HEIGHT,
            cascade_definition_path: PathBuf::from("cascades/haarcascade_frontalface_default.xml"),
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbours: DEFAULT_MIN_NEIGHBOURS,
            window_step: DEFAULT_WINDOW_STEP,
            training_corpus_path: PathBuf::from("training"),
            recognizer_algorithm: RecognizerAlgorithm::DiscriminantSubspace,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            match_direction: None,
            benchmark_log_dir: PathBuf::from("benchmark"),
        }
    }
}

impl PipelineSettings {
    /// Loads and validates a JSON settings file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json).map_err(SettingsError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(key: &'static str, reason: String) -> Result<(), SettingsError> {
            Err(SettingsError::Invalid { key, reason })
        }

        if self.frame_width == 0 || self.frame_height == 0 {
            return invalid(
                "frameWidth/frameHeight",
                format!("must be positive, got {}x{}", self.frame_width, self.frame_height),
            );
        }
        if self.face_width == 0 || self.face_height == 0 {
            return invalid(
                "faceWidth/faceHeight",
                format!("must be positive, got {}x{}", self.face_width, self.face_height),
            );
        }
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return invalid(
                "scaleFactor",
                format!("must be greater than 1.0, got {}", self.scale_factor),
            );
        }
        if self.window_step == 0 {
            return invalid("windowStep", "must be at least 1".to_string());
        }
        if !self.confidence_threshold.is_finite() {
            return invalid(
                "confidenceThreshold",
                format!("must be finite, got {}", self.confidence_threshold),
            );
        }
        Ok(())
    }

    /// Strong-match policy for the configured algorithm.
    pub fn match_policy(&self) -> MatchPolicy {
        let direction = self
            .match_direction
            .unwrap_or_else(|| self.recognizer_algorithm.score_direction());
        MatchPolicy::new(self.confidence_threshold, direction)
    }

    pub fn face_size(&self) -> (u32, u32) {
        (self.face_width, self.face_height)
    }
}
