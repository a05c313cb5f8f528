use chrono::{DateTime, Utc};

use quiz_core::model::{AnswerLabel, Question};

/// Resolution of one question, by a chosen label or by timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// `None` when the countdown expired.
    pub chosen: Option<AnswerLabel>,
    pub correct: AnswerLabel,
    pub is_correct: bool,
    pub score: u32,
}

/// Working set and progress of one running session.
///
/// `answered` flips to true exactly once per question and back to false only
/// when the next question is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    questions: Vec<Question>,
    current_index: usize,
    score: u32,
    answered: bool,
    started_at: DateTime<Utc>,
}

impl Round {
    /// `None` for an empty working set.
    #[must_use]
    pub fn new(questions: Vec<Question>, started_at: DateTime<Utc>) -> Option<Self> {
        if questions.is_empty() {
            return None;
        }
        Some(Self {
            questions,
            current_index: 0,
            score: 0,
            answered: false,
            started_at,
        })
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current(&self) -> &Question {
        &self.questions[self.current_index]
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answered
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Highest reachable score for this working set.
    #[must_use]
    pub fn max_score(&self, points_per_correct: u32) -> u32 {
        u32::try_from(self.questions.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(points_per_correct)
    }

    /// Resolve the current question with `label`. `None` if it is already resolved.
    pub fn answer(&mut self, label: AnswerLabel, points_per_correct: u32) -> Option<AnswerOutcome> {
        if self.answered {
            return None;
        }
        self.answered = true;
        let correct = self.current().correct();
        let is_correct = label == correct;
        if is_correct {
            self.score = self.score.saturating_add(points_per_correct);
        }
        Some(AnswerOutcome {
            chosen: Some(label),
            correct,
            is_correct,
            score: self.score,
        })
    }

    /// Resolve the current question as timed out. `None` if it is already resolved.
    pub fn expire(&mut self) -> Option<AnswerOutcome> {
        if self.answered {
            return None;
        }
        self.answered = true;
        Some(AnswerOutcome {
            chosen: None,
            correct: self.current().correct(),
            is_correct: false,
            score: self.score,
        })
    }

    /// Move to the next question. Returns `false` on the last one, leaving the index alone.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.current_index += 1;
        self.answered = false;
        true
    }
}
