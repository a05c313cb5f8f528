mod attempt;
mod bank;
mod ids;
mod question;

pub use ids::{AttemptId, ParseIdError, QuestionId};

pub use attempt::{AggregateStats, AttemptError, AttemptRecord};
pub use bank::{QuestionBank, SourceTier};
pub use question::{
    AnswerLabel, AnswerOptions, ParseLabelError, Question, QuestionDraft, QuestionError, RawId,
};
