//! Bounded match confidence.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfidenceError;

/// Integer score in `0..=100`; out-of-range values cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    pub const MIN: Confidence = Confidence(0);
    pub const MAX: Confidence = Confidence(100);

    /// Constructor for fixed in-crate scores; panics above `100`.
    pub(crate) const fn percent(value: u8) -> Self {
        assert!(value <= 100, "confidence above 100");
        Confidence(value)
    }

    pub fn from_int(value: i64) -> Result<Self, ConfidenceError> {
        if (0..=100).contains(&value) {
            Ok(Confidence(value as u8))
        } else {
            Err(ConfidenceError::OutOfRange(value))
        }
    }

    /// Clamp a `0.0..=1.0` score into a confidence.
    pub fn from_score(score: f64) -> Self {
        let clamped = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Confidence((clamped * 100.0).round() as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_float(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Weight this confidence by a task seed (`self * seed / 100`).
    pub fn weighted_by(self, seed: Confidence) -> Confidence {
        Confidence((u16::from(self.0) * u16::from(seed.0) / 100) as u8)
    }

    pub fn saturating_sub(self, points: u8) -> Confidence {
        Confidence(self.0.saturating_sub(points))
    }
}

impl TryFrom<i64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Confidence::from_int(value)
    }
}

impl From<Confidence> for u8 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_float())
    }
}
