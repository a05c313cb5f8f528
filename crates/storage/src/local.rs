//! Device-local attempt history: one serialized array under a fixed key.

use async_trait::async_trait;
use quiz_core::model::{AggregateStats, AttemptId, AttemptRecord};
use std::sync::Arc;
use tracing::warn;

use crate::repository::{AttemptRepository, KeyValueStore, StorageError};

/// Key holding the serialized attempt history.
pub const HISTORY_KEY: &str = "quiz_attempt_history";

#[derive(Clone)]
pub struct LocalAttemptRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalAttemptRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, HISTORY_KEY)
    }

    #[must_use]
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Read the stored history. An unreadable payload counts as empty history.
    async fn load(&self) -> Result<Vec<AttemptRecord>, StorageError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<AttemptRecord>>(&raw) {
            Ok(history) => Ok(history),
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding unreadable attempt history");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, history: &[AttemptRecord]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(history)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(&self.key, &raw).await
    }
}

#[async_trait]
impl AttemptRepository for LocalAttemptRepository {
    async fn append_attempt(&self, attempt: AttemptRecord) -> Result<AttemptRecord, StorageError> {
        let mut history = self.load().await?;
        let next_id = history
            .iter()
            .filter_map(|a| a.id.map(|id| id.value()))
            .max()
            .unwrap_or(0)
            + 1;
        let stored = attempt.with_id(AttemptId::new(next_id));
        history.push(stored.clone());
        self.save(&history).await?;
        Ok(stored)
    }

    async fn recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRecord>, StorageError> {
        let mut history = self.load().await?;
        history.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        history.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(history)
    }

    async fn aggregate(&self) -> Result<AggregateStats, StorageError> {
        let history = self.load().await?;
        Ok(AggregateStats::from_attempts(&history))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryKeyValueStore;
    use chrono::Duration;
    use quiz_core::time::fixed_now;

    fn repo() -> (LocalAttemptRepository, InMemoryKeyValueStore) {
        let store = InMemoryKeyValueStore::new();
        (LocalAttemptRepository::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn appends_assign_increasing_ids() {
        let (repo, _) = repo();
        let first = repo
            .append_attempt(AttemptRecord::new(40, fixed_now()))
            .await
            .unwrap();
        let second = repo
            .append_attempt(AttemptRecord::new(90, fixed_now()))
            .await
            .unwrap();
        assert_eq!(first.id, Some(AttemptId::new(1)));
        assert_eq!(second.id, Some(AttemptId::new(2)));

        let stats = repo.aggregate().await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, 90);
        assert_eq!(stats.average_display(), "65.0");
    }

    #[tokio::test]
    async fn history_is_one_serialized_array() {
        let (repo, store) = repo();
        repo.append_attempt(AttemptRecord::new(10, fixed_now()))
            .await
            .unwrap();
        let raw = store.get(HISTORY_KEY).await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(1));
        assert_eq!(parsed[0]["score"], 10);
    }

    #[tokio::test]
    async fn recent_attempts_are_newest_first() {
        let (repo, _) = repo();
        let now = fixed_now();
        for (i, score) in [10_u32, 20, 30].into_iter().enumerate() {
            let at = now + Duration::minutes(i64::try_from(i).unwrap());
            repo.append_attempt(AttemptRecord::new(score, at)).await.unwrap();
        }
        let recent = repo.recent_attempts(2).await.unwrap();
        let scores: Vec<_> = recent.iter().map(|a| a.score).collect();
        assert_eq!(scores, vec![30, 20]);
    }

    #[tokio::test]
    async fn corrupt_history_reads_as_empty_and_is_replaced() {
        let (repo, store) = repo();
        store.set(HISTORY_KEY, "{not json").await.unwrap();
        assert_eq!(repo.aggregate().await.unwrap(), AggregateStats::zero());

        repo.append_attempt(AttemptRecord::new(70, fixed_now()))
            .await
            .unwrap();
        assert_eq!(repo.aggregate().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn clear_removes_history() {
        let (repo, _) = repo();
        repo.append_attempt(AttemptRecord::new(70, fixed_now()))
            .await
            .unwrap();
        repo.clear().await.unwrap();
        assert!(repo.aggregate().await.unwrap().is_empty());
    }
}
