#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod narration;
pub mod persistence;
pub mod question_source;
pub mod remote;
pub mod sessions;
pub mod settings;
pub mod timer;

pub use quiz_core::Clock;
pub use sessions as session;

pub use app_services::QuizServices;
pub use error::{
    AudioError, LoadError, NarrationError, PersistenceError, QuestionSourceError,
    QuizServicesError, RemoteError, SessionError,
};
pub use narration::{NarrationPort, Narrator, NoopNarration, Utterance, select_voice};
pub use persistence::{Backing, PersistenceGateway};
pub use question_source::{LoadStatus, QuestionFile, QuestionSource};
pub use remote::{RemoteBackend, RemoteConfig};
pub use settings::{QuizSettings, SettingsError, VoiceHint};
pub use timer::{CountdownTimer, SilentTick, Thresholds, TickSound, TimerEvent, TimerEventKind, TimerTick, Urgency};

pub use sessions::{
    Advanced, AnswerFeedback, FinalReport, QuestionView, QuizSession, ResultTier, SessionEvent,
    SessionPhase,
};
