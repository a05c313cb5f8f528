use std::fmt;

use quiz_core::model::{AggregateStats, AttemptRecord};

/// Message tier picked from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTier {
    High,
    Middle,
    Low,
}

impl ResultTier {
    /// `>= 80` high, `>= 50` middle, anything lower is low.
    #[must_use]
    pub fn for_score(score: u32) -> Self {
        match score {
            80.. => Self::High,
            50.. => Self::Middle,
            _ => Self::Low,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::High => "You know me perfectly. This is true love!",
            Self::Middle => "Not bad at all, but we need a few more dates.",
            Self::Low => "We need to spend more time together!",
        }
    }
}

impl fmt::Display for ResultTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Middle => "middle",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

/// Everything shown once a session is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub score: u32,
    pub max_score: u32,
    pub tier: ResultTier,
    pub stats: AggregateStats,
    /// `None` when the attempt could not be persisted anywhere.
    pub record: Option<AttemptRecord>,
    pub total_seconds: u32,
}

impl FinalReport {
    #[must_use]
    pub fn new(
        score: u32,
        max_score: u32,
        stats: AggregateStats,
        record: Option<AttemptRecord>,
        total_seconds: u32,
    ) -> Self {
        Self {
            score,
            max_score,
            tier: ResultTier::for_score(score),
            stats,
            record,
            total_seconds,
        }
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        self.tier.message()
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.record.is_some()
    }

    /// "First attempt" until a second attempt exists, then count, best and average.
    #[must_use]
    pub fn attempt_label(&self) -> String {
        if self.stats.count <= 1 {
            return "First attempt".to_string();
        }
        format!(
            "Attempt {} | Best: {} | Average: {}",
            self.stats.count,
            self.stats.max,
            self.stats.average_display()
        )
    }

    /// Line handed to narration when the session ends.
    #[must_use]
    pub fn narration(&self) -> String {
        format!("You scored {} points. {}", self.score, self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(ResultTier::for_score(100), ResultTier::High);
        assert_eq!(ResultTier::for_score(80), ResultTier::High);
        assert_eq!(ResultTier::for_score(79), ResultTier::Middle);
        assert_eq!(ResultTier::for_score(50), ResultTier::Middle);
        assert_eq!(ResultTier::for_score(49), ResultTier::Low);
        assert_eq!(ResultTier::for_score(0), ResultTier::Low);
    }

    #[test]
    fn attempt_label_reflects_history() {
        let first = FinalReport::new(
            40,
            50,
            AggregateStats {
                count: 1,
                max: 40,
                min: 40,
                average: 40.0,
            },
            None,
            12,
        );
        assert_eq!(first.attempt_label(), "First attempt");
        assert!(!first.is_persisted());

        let third = FinalReport::new(
            90,
            100,
            AggregateStats {
                count: 3,
                max: 90,
                min: 40,
                average: 63.333,
            },
            None,
            30,
        );
        assert_eq!(third.attempt_label(), "Attempt 3 | Best: 90 | Average: 63.3");
        assert_eq!(
            third.narration(),
            "You scored 90 points. You know me perfectly. This is true love!"
        );
    }
}
