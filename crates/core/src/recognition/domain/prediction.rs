use serde::{Deserialize, Serialize};

/// Recognizer output: the nearest training label and its score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub label: i32,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: i32, confidence: f64) -> Self {
        Self { label, confidence }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreDirection {
    /// Similarity score: a strong match lies above the threshold.
    HigherIsStronger,
    /// Distance score: a strong match lies below the threshold.
    LowerIsStronger,
}

/// Decides whether a prediction counts as a strong match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchPolicy {
    threshold: f64,
    direction: ScoreDirection,
}

impl MatchPolicy {
    pub fn new(threshold: f64, direction: ScoreDirection) -> Self {
        Self {
            threshold,
            direction,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn direction(&self) -> ScoreDirection {
        self.direction
    }

    /// Strict comparison; a score equal to the threshold is never strong.
    pub fn is_strong_match(&self, prediction: &Prediction) -> bool {
        match self.direction {
            ScoreDirection::HigherIsStronger => prediction.confidence > self.threshold,
            ScoreDirection::LowerIsStronger => prediction.confidence < self.threshold,
        }
    }
}
