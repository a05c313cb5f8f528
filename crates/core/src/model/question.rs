use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a raw question record is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("option {0} is missing or empty")]
    MissingOption(AnswerLabel),

    #[error("correct answer label is missing")]
    MissingCorrectLabel,

    #[error("correct answer label is invalid: {0:?}")]
    InvalidCorrectLabel(String),
}

/// Error returned when text is not one of the answer labels.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("not an answer label: {raw:?}")]
pub struct ParseLabelError {
    raw: String,
}

//
// ─── ANSWER LABEL ──────────────────────────────────────────────────────────────
//

/// One of the three answer slots shown for every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
}

impl AnswerLabel {
    /// All labels in display order.
    pub const ALL: [AnswerLabel; 3] = [AnswerLabel::A, AnswerLabel::B, AnswerLabel::C];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerLabel::A => "A",
            AnswerLabel::B => "B",
            AnswerLabel::C => "C",
        }
    }
}

impl fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(AnswerLabel::A),
            "B" => Ok(AnswerLabel::B),
            "C" => Ok(AnswerLabel::C),
            other => Err(ParseLabelError {
                raw: other.to_string(),
            }),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// The three option texts of a question, all guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOptions {
    a: String,
    b: String,
    c: String,
}

impl AnswerOptions {
    /// Build options from three texts.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::MissingOption` for the first blank text.
    pub fn new(
        a: impl Into<String>,
        b: impl Into<String>,
        c: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let a = a.into();
        let b = b.into();
        let c = c.into();
        for (label, text) in AnswerLabel::ALL.into_iter().zip([&a, &b, &c]) {
            if text.trim().is_empty() {
                return Err(QuestionError::MissingOption(label));
            }
        }
        Ok(Self { a, b, c })
    }

    #[must_use]
    pub fn get(&self, label: AnswerLabel) -> &str {
        match label {
            AnswerLabel::A => &self.a,
            AnswerLabel::B => &self.b,
            AnswerLabel::C => &self.c,
        }
    }

    /// Iterate `(label, text)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (AnswerLabel, &str)> {
        AnswerLabel::ALL.into_iter().map(|label| (label, self.get(label)))
    }
}

/// A validated quiz question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: Option<QuestionId>,
    text: String,
    options: AnswerOptions,
    correct: AnswerLabel,
}

impl Question {
    /// Creates a question from already-validated parts.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` if the prompt is blank.
    pub fn new(
        id: Option<QuestionId>,
        text: impl Into<String>,
        options: AnswerOptions,
        correct: AnswerLabel,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        Ok(Self {
            id,
            text,
            options,
            correct,
        })
    }

    #[must_use]
    pub fn id(&self) -> Option<&QuestionId> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &AnswerOptions {
        &self.options
    }

    #[must_use]
    pub fn correct(&self) -> AnswerLabel {
        self.correct
    }

    #[must_use]
    pub fn correct_text(&self) -> &str {
        self.options.get(self.correct)
    }

}

//
// ─── RAW RECORDS ───────────────────────────────────────────────────────────────
//

/// Identifier as it appears in raw records: remote rows use numbers, documents may use text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for QuestionId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => QuestionId::new(n.to_string()),
            RawId::Text(s) => QuestionId::new(s),
        }
    }
}

/// Unvalidated question record as produced by a source tier.
///
/// Every field is optional so that a malformed record still deserializes and
/// is rejected by [`QuestionDraft::validate`] instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default, alias = "question", alias = "prompt", alias = "pregunta")]
    pub text: Option<String>,
    #[serde(default, alias = "opciones")]
    pub options: BTreeMap<String, String>,
    #[serde(default, alias = "correct_answer", alias = "correctAnswer", alias = "correcta")]
    pub correct: Option<String>,
}

impl QuestionDraft {
    /// Convenience constructor used by the built-in bank and tests.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        options: [&str; 3],
        correct: impl Into<String>,
    ) -> Self {
        let options = AnswerLabel::ALL
            .into_iter()
            .zip(options)
            .map(|(label, text)| (label.as_str().to_string(), text.to_string()))
            .collect();
        Self {
            id: None,
            text: Some(text.into()),
            options,
            correct: Some(correct.into()),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: RawId) -> Self {
        self.id = Some(id);
        self
    }

    /// Apply the question shape predicate.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` found; a record is never partially accepted.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let text = self
            .text
            .filter(|t| !t.trim().is_empty())
            .ok_or(QuestionError::EmptyText)?;

        let mut options = self.options;
        let mut take = |label: AnswerLabel| {
            options
                .remove(label.as_str())
                .filter(|t| !t.trim().is_empty())
                .ok_or(QuestionError::MissingOption(label))
        };
        let a = take(AnswerLabel::A)?;
        let b = take(AnswerLabel::B)?;
        let c = take(AnswerLabel::C)?;

        let raw_correct = self.correct.ok_or(QuestionError::MissingCorrectLabel)?;
        let correct = raw_correct
            .parse::<AnswerLabel>()
            .map_err(|_| QuestionError::InvalidCorrectLabel(raw_correct.clone()))?;

        Ok(Question {
            id: self.id.map(QuestionId::from),
            text,
            options: AnswerOptions { a, b, c },
            correct,
        })
    }

    /// Deserialize one raw JSON record and validate it.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` when the value is not an object of the
    /// expected shape, or any validation error.
    pub fn validate_value(value: serde_json::Value) -> Result<Question, QuestionError> {
        let draft: QuestionDraft =
            serde_json::from_value(value).map_err(|_| QuestionError::EmptyText)?;
        draft.validate()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_draft_becomes_question() {
        let question = QuestionDraft::new("Capital of Peru?", ["Lima", "Cusco", "Quito"], "A")
            .with_id(RawId::Number(4))
            .validate()
            .unwrap();

        assert_eq!(question.text(), "Capital of Peru?");
        assert_eq!(question.correct(), AnswerLabel::A);
        assert_eq!(question.correct_text(), "Lima");
        assert_eq!(question.id().map(QuestionId::as_str), Some("4"));
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = QuestionDraft::new("  ", ["x", "y", "z"], "B")
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);
    }

    #[test]
    fn missing_option_is_rejected() {
        let mut draft = QuestionDraft::new("Q", ["x", "y", "z"], "B");
        draft.options.remove("C");
        assert_eq!(
            draft.validate().unwrap_err(),
            QuestionError::MissingOption(AnswerLabel::C)
        );

        let err = QuestionDraft::new("Q", ["x", "", "z"], "A")
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::MissingOption(AnswerLabel::B));
    }

    #[test]
    fn correct_label_must_be_a_b_or_c() {
        let err = QuestionDraft::new("Q", ["x", "y", "z"], "D")
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::InvalidCorrectLabel("D".into()));

        let err = QuestionDraft::new("Q", ["x", "y", "z"], "a")
            .validate()
            .unwrap_err();
        assert!(matches!(err, QuestionError::InvalidCorrectLabel(_)));

        let mut draft = QuestionDraft::new("Q", ["x", "y", "z"], "A");
        draft.correct = None;
        assert_eq!(draft.validate().unwrap_err(), QuestionError::MissingCorrectLabel);
    }

    #[test]
    fn document_records_accept_aliases() {
        let value = json!({
            "id": "first-date",
            "question": "Where was our first date?",
            "options": { "A": "A restaurant", "B": "At home", "C": "The park" },
            "correct": "C"
        });
        let question = QuestionDraft::validate_value(value).unwrap();
        assert_eq!(question.id().map(QuestionId::as_str), Some("first-date"));
        assert_eq!(question.correct_text(), "The park");
    }

    #[test]
    fn spanish_record_keys_are_accepted() {
        let value = json!({
            "id": 7,
            "pregunta": "¿Dónde fue nuestra primera cita?",
            "opciones": { "A": "Un restaurante", "B": "En casa", "C": "El parque" },
            "correcta": "B"
        });
        let question = QuestionDraft::validate_value(value).unwrap();
        assert_eq!(question.text(), "¿Dónde fue nuestra primera cita?");
        assert_eq!(question.correct(), AnswerLabel::B);
        assert_eq!(question.correct_text(), "En casa");
    }

    #[test]
    fn non_object_record_is_rejected() {
        assert!(QuestionDraft::validate_value(json!(42)).is_err());
        assert!(QuestionDraft::validate_value(json!({"options": {"A": 1}})).is_err());
    }

    #[test]
    fn options_iterate_in_label_order() {
        let options = AnswerOptions::new("one", "two", "three").unwrap();
        let labels: Vec<_> = options.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, AnswerLabel::ALL.to_vec());
        assert!(AnswerOptions::new("one", " ", "three").is_err());
    }
}
