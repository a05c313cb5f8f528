use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::question::{Question, QuestionDraft};

/// Where a question bank was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Remote,
    LocalFile,
    BuiltIn,
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceTier::Remote => "remote",
            SourceTier::LocalFile => "local-file",
            SourceTier::BuiltIn => "built-in",
        };
        f.write_str(name)
    }
}

/// The full validated pool of questions available for a session.
///
/// Immutable once built; a reload produces a new bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
    tier: SourceTier,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Vec<Question>, tier: SourceTier) -> Self {
        Self { questions, tier }
    }

    /// Validate raw drafts, keeping only the records that pass.
    ///
    /// Returns the bank and the number of rejected records.
    pub fn from_drafts(
        drafts: impl IntoIterator<Item = QuestionDraft>,
        tier: SourceTier,
    ) -> (Self, usize) {
        let mut rejected = 0_usize;
        let questions = drafts
            .into_iter()
            .filter_map(|draft| match draft.validate() {
                Ok(question) => Some(question),
                Err(_) => {
                    rejected += 1;
                    None
                }
            })
            .collect();
        (Self { questions, tier }, rejected)
    }

    /// Same as [`QuestionBank::from_drafts`] for untyped JSON records.
    pub fn from_values(
        values: impl IntoIterator<Item = serde_json::Value>,
        tier: SourceTier,
    ) -> (Self, usize) {
        let mut rejected = 0_usize;
        let questions = values
            .into_iter()
            .filter_map(|value| match QuestionDraft::validate_value(value) {
                Ok(question) => Some(question),
                Err(_) => {
                    rejected += 1;
                    None
                }
            })
            .collect();
        (Self { questions, tier }, rejected)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn tier(&self) -> SourceTier {
        self.tier
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_drafts_are_dropped_and_counted() {
        let drafts = vec![
            QuestionDraft::new("Q1", ["a", "b", "c"], "A"),
            QuestionDraft::new("", ["a", "b", "c"], "A"),
            QuestionDraft::new("Q3", ["a", "b", "c"], "Z"),
            QuestionDraft::new("Q4", ["a", "b", "c"], "C"),
        ];
        let (bank, rejected) = QuestionBank::from_drafts(drafts, SourceTier::Remote);
        assert_eq!(bank.len(), 2);
        assert_eq!(rejected, 2);
        assert_eq!(bank.tier(), SourceTier::Remote);
        assert_eq!(bank.questions()[1].text(), "Q4");
    }

    #[test]
    fn values_with_wrong_types_are_dropped() {
        let values = vec![
            json!({"text": "ok", "options": {"A": "1", "B": "2", "C": "3"}, "correct": "B"}),
            json!("not a record"),
            json!({"text": "bad", "options": {"A": 1, "B": 2, "C": 3}, "correct": "B"}),
        ];
        let (bank, rejected) = QuestionBank::from_values(values, SourceTier::LocalFile);
        assert_eq!(bank.len(), 1);
        assert_eq!(rejected, 2);
    }
}
