use async_trait::async_trait;
use quiz_core::model::{AggregateStats, AttemptRecord, QuestionDraft};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::local::LocalAttemptRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("operation not supported by this backing")]
    Unsupported,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Remote query capability returning raw question rows.
#[async_trait]
pub trait QuestionFeed: Send + Sync {
    /// Fetch every active question row, mapped into raw drafts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the rows cannot be fetched or decoded.
    async fn fetch_questions(&self) -> Result<Vec<QuestionDraft>, StorageError>;
}

/// Append-only store of completed attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist a new attempt and return it as stored (with its id when the backing assigns one).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be written.
    async fn append_attempt(&self, attempt: AttemptRecord) -> Result<AttemptRecord, StorageError>;

    /// Most recent attempts first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempts cannot be read.
    async fn recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRecord>, StorageError>;

    /// Aggregate over every attempt in this backing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempts cannot be read.
    async fn aggregate(&self) -> Result<AggregateStats, StorageError>;

    /// Drop every recorded attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unsupported` for shared backings.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// String store keyed by fixed keys, the device-local boundary.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the key cannot be removed.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory key-value store for testing and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Device-local storage behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_kv(Arc::new(InMemoryKeyValueStore::new()))
    }

    /// Build attempt storage over any key-value store.
    #[must_use]
    pub fn from_kv(kv: Arc<dyn KeyValueStore>) -> Self {
        let attempts: Arc<dyn AttemptRepository> =
            Arc::new(LocalAttemptRepository::new(Arc::clone(&kv)));
        Self { kv, attempts }
    }
}
