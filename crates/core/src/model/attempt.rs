use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::AttemptId;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("aggregate minimum ({min}) is above maximum ({max})")]
    InvalidBounds { min: u32, max: u32 },

    #[error("aggregate average ({average}) is outside [{min}, {max}]")]
    InvalidAverage { average: f64, min: u32, max: u32 },

    #[error("aggregate over zero attempts must be all zeros")]
    NonZeroEmpty,
}

/// One completed session's final score, append-only once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AttemptId>,
    pub score: u32,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_seconds: Option<u32>,
}

impl AttemptRecord {
    #[must_use]
    pub fn new(score: u32, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            score,
            recorded_at,
            total_seconds: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: AttemptId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_total_seconds(mut self, secs: Option<u32>) -> Self {
        self.total_seconds = secs;
        self
    }
}

/// Count / best / worst / mean over every recorded attempt.
///
/// Never stored locally; always recomputed from the attempt set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub count: u32,
    pub max: u32,
    pub min: u32,
    pub average: f64,
}

impl AggregateStats {
    /// Stats over zero attempts.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_attempts(attempts: &[AttemptRecord]) -> Self {
        if attempts.is_empty() {
            return Self::zero();
        }
        let count = u32::try_from(attempts.len()).unwrap_or(u32::MAX);
        let max = attempts.iter().map(|a| a.score).max().unwrap_or(0);
        let min = attempts.iter().map(|a| a.score).min().unwrap_or(0);
        let sum: u64 = attempts.iter().map(|a| u64::from(a.score)).sum();
        #[allow(clippy::cast_precision_loss)]
        let average = sum as f64 / attempts.len() as f64;
        Self {
            count,
            max,
            min,
            average,
        }
    }

    /// Rehydrate aggregate values computed by a backing store.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` when the values cannot describe a real attempt set.
    pub fn from_persisted(count: u32, max: u32, min: u32, average: f64) -> Result<Self, AttemptError> {
        if count == 0 {
            if max != 0 || min != 0 || average != 0.0 {
                return Err(AttemptError::NonZeroEmpty);
            }
            return Ok(Self::zero());
        }
        if min > max {
            return Err(AttemptError::InvalidBounds { min, max });
        }
        if !average.is_finite() || average < f64::from(min) || average > f64::from(max) {
            return Err(AttemptError::InvalidAverage { average, min, max });
        }
        Ok(Self {
            count,
            max,
            min,
            average,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Average rendered with one decimal place.
    #[must_use]
    pub fn average_display(&self) -> String {
        format!("{:.1}", self.average)
    }
}
