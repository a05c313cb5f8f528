use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use quiz_core::model::{QuestionBank, QuestionDraft, SourceTier};
use storage::repository::QuestionFeed;

use crate::error::{LoadError, QuestionSourceError};

/// Location of the static question document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionFile {
    Path(PathBuf),
    Url(String),
}

impl QuestionFile {
    /// `http(s)://` locations are fetched, anything else is read from disk.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }
}

/// Static document layout: a top-level field holding raw question records.
#[derive(Debug, Deserialize)]
struct QuestionDocument {
    #[serde(alias = "preguntas")]
    questions: Vec<serde_json::Value>,
}

/// Outcome of a load request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Loaded(Arc<QuestionBank>),
    /// Another load is in flight; nothing was started.
    InProgress,
}

/// Clears the in-flight flag when the load that set it ends, however it ends.
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Resolves the question bank: remote service, then static document, then built-in list.
pub struct QuestionSource {
    remote: Option<Arc<dyn QuestionFeed>>,
    file: Option<QuestionFile>,
    builtin: bool,
    http: Client,
    bank: RwLock<Option<Arc<QuestionBank>>>,
    loading: AtomicBool,
}

impl QuestionSource {
    #[must_use]
    pub fn new(remote: Option<Arc<dyn QuestionFeed>>, file: Option<QuestionFile>) -> Self {
        Self {
            remote,
            file,
            builtin: true,
            http: Client::new(),
            bank: RwLock::new(None),
            loading: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_builtin_fallback(mut self, enabled: bool) -> Self {
        self.builtin = enabled;
        self
    }

    /// The bank from the last successful load, if any.
    pub async fn bank(&self) -> Option<Arc<QuestionBank>> {
        self.bank.read().await.clone()
    }

    /// Return the loaded bank, loading it first when nothing is loaded yet.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSourceError::NoValidQuestions` if every tier fails.
    pub async fn ensure_loaded(&self) -> Result<LoadStatus, QuestionSourceError> {
        if let Some(bank) = self.bank().await {
            return Ok(LoadStatus::Loaded(bank));
        }
        self.load().await
    }

    /// Resolve a fresh bank through the tiers and replace the current one in full.
    ///
    /// A call made while another load is in flight returns `LoadStatus::InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSourceError::NoValidQuestions` if every tier fails.
    pub async fn load(&self) -> Result<LoadStatus, QuestionSourceError> {
        let Some(_guard) = LoadGuard::acquire(&self.loading) else {
            debug!("question load already in progress");
            return Ok(LoadStatus::InProgress);
        };

        let bank = Arc::new(self.resolve().await?);
        info!(tier = %bank.tier(), questions = bank.len(), "question bank loaded");
        *self.bank.write().await = Some(Arc::clone(&bank));
        Ok(LoadStatus::Loaded(bank))
    }

    async fn resolve(&self) -> Result<QuestionBank, QuestionSourceError> {
        match self.load_remote().await {
            Ok(bank) => return Ok(bank),
            Err(LoadError::Absent) => debug!("remote question tier not configured"),
            Err(err) => warn!(error = %err, "remote question tier failed"),
        }

        match self.load_file().await {
            Ok(bank) => return Ok(bank),
            Err(LoadError::Absent) => debug!("question document not configured"),
            Err(err) => warn!(error = %err, "question document tier failed"),
        }

        if self.builtin {
            warn!("using built-in fallback questions");
            let (bank, _) = QuestionBank::from_drafts(builtin_drafts(), SourceTier::BuiltIn);
            return Ok(bank);
        }

        Err(QuestionSourceError::NoValidQuestions)
    }

    async fn load_remote(&self) -> Result<QuestionBank, LoadError> {
        let remote = self.remote.as_ref().ok_or(LoadError::Absent)?;
        let drafts = remote.fetch_questions().await?;
        let (bank, rejected) = QuestionBank::from_drafts(drafts, SourceTier::Remote);
        non_empty(bank, rejected)
    }

    async fn load_file(&self) -> Result<QuestionBank, LoadError> {
        let file = self.file.as_ref().ok_or(LoadError::Absent)?;
        let raw = match file {
            QuestionFile::Path(path) => tokio::fs::read_to_string(path).await?,
            QuestionFile::Url(url) => {
                self.http
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?
            }
        };
        let document: QuestionDocument =
            serde_json::from_str(&raw).map_err(|e| LoadError::Document(e.to_string()))?;
        let (bank, rejected) = QuestionBank::from_values(document.questions, SourceTier::LocalFile);
        non_empty(bank, rejected)
    }
}

fn non_empty(bank: QuestionBank, rejected: usize) -> Result<QuestionBank, LoadError> {
    if rejected > 0 {
        debug!(tier = %bank.tier(), rejected, "dropped invalid question records");
    }
    if bank.is_empty() {
        return Err(LoadError::NoValidQuestions);
    }
    Ok(bank)
}

/// Last-resort bank, used only when every other tier fails.
fn builtin_drafts() -> Vec<QuestionDraft> {
    vec![
        QuestionDraft::new(
            "Where was our first date?",
            ["A restaurant", "At home", "The old cinema"],
            "C",
        ),
        QuestionDraft::new("What is my favourite colour?", ["Black", "Red", "Green"], "A"),
        QuestionDraft::new(
            "What kind of song is our song?",
            ["A reggaeton hit", "A pop ballad", "A rock anthem"],
            "A",
        ),
        QuestionDraft::new(
            "What do I like doing in my free time?",
            ["Reading novels", "Studying", "Watching films"],
            "B",
        ),
        QuestionDraft::new("What is my favourite food?", ["Pizza", "Pasta", "Chicken"], "C"),
    ]
}
