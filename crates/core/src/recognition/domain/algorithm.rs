use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::prediction::ScoreDirection;

#[derive(Error, Debug, PartialEq)]
#[error(
    "unknown recognizer algorithm `{0}` (expected variance-subspace, \
     discriminant-subspace or local-binary-histogram)"
)]
pub struct UnknownAlgorithm(pub String);

/// Appearance model family used by the recognizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognizerAlgorithm {
    /// Principal components of the training set (eigenfaces).
    VarianceSubspace,
    /// Linear discriminant on top of PCA (fisherfaces).
    DiscriminantSubspace,
    /// Grid of local binary pattern histograms.
    LocalBinaryHistogram,
}

impl RecognizerAlgorithm {
    pub const ALL: [RecognizerAlgorithm; 3] = [
        RecognizerAlgorithm::VarianceSubspace,
        RecognizerAlgorithm::DiscriminantSubspace,
        RecognizerAlgorithm::LocalBinaryHistogram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerAlgorithm::VarianceSubspace => "variance-subspace",
            RecognizerAlgorithm::DiscriminantSubspace => "discriminant-subspace",
            RecognizerAlgorithm::LocalBinaryHistogram => "local-binary-histogram",
        }
    }

    /// How this family's confidence score relates to match strength.
    ///
    /// All three report a nearest-neighbour distance.
    pub fn score_direction(&self) -> ScoreDirection {
        match self {
            RecognizerAlgorithm::VarianceSubspace
            | RecognizerAlgorithm::DiscriminantSubspace
            | RecognizerAlgorithm::LocalBinaryHistogram => ScoreDirection::LowerIsStronger,
        }
    }

    /// Fewest distinct labels a corpus needs for this family.
    pub fn min_labels(&self) -> usize {
        match self {
            RecognizerAlgorithm::DiscriminantSubspace => 2,
            RecognizerAlgorithm::VarianceSubspace | RecognizerAlgorithm::LocalBinaryHistogram => 1,
        }
    }
}

impl fmt::Display for RecognizerAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecognizerAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}
