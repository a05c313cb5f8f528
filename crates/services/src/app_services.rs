use std::sync::Arc;

use tracing::{info, warn};

use storage::repository::{AttemptRepository, QuestionFeed, Storage};

use crate::error::QuizServicesError;
use crate::narration::NarrationPort;
use crate::persistence::{Backing, PersistenceGateway};
use crate::question_source::{QuestionFile, QuestionSource};
use crate::remote::RemoteBackend;
use crate::sessions::QuizSession;
use crate::settings::QuizSettings;
use crate::timer::TickSound;
use crate::Clock;

/// Assembles the question source and persistence gateway a session runs against.
#[derive(Clone)]
pub struct QuizServices {
    settings: QuizSettings,
    storage: Storage,
    source: Arc<QuestionSource>,
    gateway: Arc<PersistenceGateway>,
}

impl QuizServices {
    /// Build services over `SQLite` device-local storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        settings: QuizSettings,
        clock: Clock,
        remote: Option<RemoteBackend>,
        questions: Option<QuestionFile>,
    ) -> Result<Self, QuizServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::bootstrap(storage, settings, clock, remote, questions).await)
    }

    /// Wire services over `storage`, probing `remote` once to pick the backing.
    pub async fn bootstrap(
        storage: Storage,
        settings: QuizSettings,
        clock: Clock,
        remote: Option<RemoteBackend>,
        questions: Option<QuestionFile>,
    ) -> Self {
        let remote = match remote {
            Some(backend) => match backend.probe().await {
                Ok(()) => Some(Arc::new(backend)),
                Err(err) => {
                    warn!(error = %err, "remote backend unavailable; using local storage");
                    None
                }
            },
            None => None,
        };

        let local = Arc::clone(&storage.attempts);
        let (feed, gateway) = match remote {
            Some(backend) => {
                let feed: Arc<dyn QuestionFeed> = backend.clone();
                let attempts: Arc<dyn AttemptRepository> = backend;
                (Some(feed), PersistenceGateway::remote(attempts, local))
            }
            None => (None, PersistenceGateway::local(local)),
        };
        let gateway = gateway.with_clock(clock);
        info!(
            backing = ?gateway.backing(),
            remote_questions = feed.is_some(),
            "quiz services ready"
        );

        let source = QuestionSource::new(feed, questions)
            .with_builtin_fallback(settings.builtin_fallback());

        Self {
            settings,
            storage,
            source: Arc::new(source),
            gateway: Arc::new(gateway),
        }
    }

    /// Services with in-memory storage, no remote and no question document.
    pub async fn in_memory(settings: QuizSettings, clock: Clock) -> Self {
        Self::bootstrap(Storage::in_memory(), settings, clock, None, None).await
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn source(&self) -> Arc<QuestionSource> {
        Arc::clone(&self.source)
    }

    #[must_use]
    pub fn gateway(&self) -> Arc<PersistenceGateway> {
        Arc::clone(&self.gateway)
    }

    #[must_use]
    pub fn backing(&self) -> Backing {
        self.gateway.backing()
    }

    /// A new idle session sharing this bundle's source and gateway.
    #[must_use]
    pub fn session(&self, narration: Arc<dyn NarrationPort>, sound: Arc<dyn TickSound>) -> QuizSession {
        QuizSession::new(
            self.settings.clone(),
            self.source(),
            self.gateway(),
            narration,
            sound,
        )
    }
}
