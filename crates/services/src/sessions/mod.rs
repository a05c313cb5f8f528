mod quiz;
mod report;
mod round;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use quiz::{AnswerFeedback, Advanced, QuestionView, QuizSession, SessionEvent, SessionPhase};
pub use report::{FinalReport, ResultTier};
pub use round::{AnswerOutcome, Round};
