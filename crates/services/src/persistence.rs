use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use quiz_core::Clock;
use quiz_core::model::{AggregateStats, AttemptRecord};
use storage::repository::AttemptRepository;

use crate::error::PersistenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    Remote,
    Local,
}

/// Records attempts and serves aggregate stats over one backing, with an optional
/// device-local fallback.
///
/// After the first failed write on the primary the gateway stays on the fallback.
pub struct PersistenceGateway {
    primary: Arc<dyn AttemptRepository>,
    fallback: Option<Arc<dyn AttemptRepository>>,
    primary_backing: Backing,
    clock: Clock,
    degraded: AtomicBool,
}

impl PersistenceGateway {
    /// Gateway over device-local storage only.
    #[must_use]
    pub fn local(local: Arc<dyn AttemptRepository>) -> Self {
        Self {
            primary: local,
            fallback: None,
            primary_backing: Backing::Local,
            clock: Clock::default(),
            degraded: AtomicBool::new(false),
        }
    }

    /// Gateway over the shared remote backing, falling back to `local`.
    #[must_use]
    pub fn remote(remote: Arc<dyn AttemptRepository>, local: Arc<dyn AttemptRepository>) -> Self {
        Self {
            primary: remote,
            fallback: Some(local),
            primary_backing: Backing::Remote,
            clock: Clock::default(),
            degraded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Backing currently used for reads and writes.
    #[must_use]
    pub fn backing(&self) -> Backing {
        if self.is_degraded() {
            Backing::Local
        } else {
            self.primary_backing
        }
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn active(&self) -> &Arc<dyn AttemptRepository> {
        match &self.fallback {
            Some(local) if self.is_degraded() => local,
            _ => &self.primary,
        }
    }

    /// Fallback that has not been switched to yet.
    fn spare(&self) -> Option<&Arc<dyn AttemptRepository>> {
        self.fallback.as_ref().filter(|_| !self.is_degraded())
    }

    fn local_repo(&self) -> &Arc<dyn AttemptRepository> {
        self.fallback.as_ref().unwrap_or(&self.primary)
    }

    /// Persist a finished attempt.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Write` if neither backing accepts the attempt.
    pub async fn record_attempt(
        &self,
        score: u32,
        total_seconds: Option<u32>,
    ) -> Result<AttemptRecord, PersistenceError> {
        let attempt = AttemptRecord::new(score, self.clock.now()).with_total_seconds(total_seconds);
        match self.active().append_attempt(attempt.clone()).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                let Some(local) = self.spare() else {
                    warn!(error = %err, "attempt write failed");
                    return Err(PersistenceError::Write(err));
                };
                warn!(error = %err, "remote attempt write failed; switching to local history");
                self.degraded.store(true, Ordering::Release);
                local.append_attempt(attempt).await.map_err(|err| {
                    warn!(error = %err, "local attempt write failed");
                    PersistenceError::Write(err)
                })
            }
        }
    }

    /// Aggregate over every recorded attempt. Any read failure yields zeroed stats.
    pub async fn stats(&self) -> AggregateStats {
        match self.active().aggregate().await {
            Ok(stats) => return stats,
            Err(err) => warn!(error = %err, "stats read failed"),
        }
        if let Some(local) = self.spare() {
            match local.aggregate().await {
                Ok(stats) => return stats,
                Err(err) => warn!(error = %err, "local stats read failed"),
            }
        }
        AggregateStats::zero()
    }

    /// Newest attempts first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Storage` if no backing can be read.
    pub async fn recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRecord>, PersistenceError> {
        match self.active().recent_attempts(limit).await {
            Ok(attempts) => Ok(attempts),
            Err(err) => {
                let Some(local) = self.spare() else {
                    return Err(err.into());
                };
                warn!(error = %err, "recent attempts read failed; using local history");
                Ok(local.recent_attempts(limit).await?)
            }
        }
    }

    /// Drop the device-local history. The shared backing is never cleared.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Storage` if the local store cannot be written.
    pub async fn clear_local_history(&self) -> Result<(), PersistenceError> {
        Ok(self.local_repo().clear().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::time::fixed_clock;
    use storage::repository::{Storage, StorageError};

    struct Unreachable;

    #[async_trait]
    impl AttemptRepository for Unreachable {
        async fn append_attempt(&self, _attempt: AttemptRecord) -> Result<AttemptRecord, StorageError> {
            Err(StorageError::Connection("unreachable".into()))
        }

        async fn recent_attempts(&self, _limit: u32) -> Result<Vec<AttemptRecord>, StorageError> {
            Err(StorageError::Connection("unreachable".into()))
        }

        async fn aggregate(&self) -> Result<AggregateStats, StorageError> {
            Err(StorageError::Connection("unreachable".into()))
        }

        async fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::Unsupported)
        }
    }

    #[tokio::test]
    async fn zero_attempts_give_zero_stats() {
        let gateway = PersistenceGateway::local(Storage::in_memory().attempts);
        let stats = gateway.stats().await;
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max, 0);
        assert!(stats.average.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failed_remote_write_lands_in_local_history() {
        let local = Storage::in_memory().attempts;
        let gateway =
            PersistenceGateway::remote(Arc::new(Unreachable), Arc::clone(&local)).with_clock(fixed_clock());
        assert_eq!(gateway.backing(), Backing::Remote);

        let stored = gateway.record_attempt(70, Some(42)).await.unwrap();
        assert_eq!(stored.score, 70);
        assert_eq!(gateway.backing(), Backing::Local);

        let stats = gateway.stats().await;
        assert_eq!(stats.count, 1);
        assert_eq!(stats.max, 70);
        assert_eq!(local.aggregate().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn write_fails_when_every_backing_fails() {
        let gateway = PersistenceGateway::remote(Arc::new(Unreachable), Arc::new(Unreachable));
        assert!(matches!(
            gateway.record_attempt(10, None).await,
            Err(PersistenceError::Write(_))
        ));
        assert_eq!(gateway.stats().await, AggregateStats::zero());
    }

    #[tokio::test]
    async fn stats_read_falls_back_without_degrading() {
        let local = Storage::in_memory().attempts;
        local
            .append_attempt(AttemptRecord::new(50, quiz_core::time::fixed_now()))
            .await
            .unwrap();
        let gateway = PersistenceGateway::remote(Arc::new(Unreachable), local);
        assert_eq!(gateway.stats().await.count, 1);
        assert_eq!(gateway.backing(), Backing::Remote);
        assert_eq!(gateway.recent_attempts(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clearing_targets_local_history() {
        let local = Storage::in_memory().attempts;
        let gateway = PersistenceGateway::remote(Arc::new(Unreachable), Arc::clone(&local));
        gateway.record_attempt(30, None).await.unwrap();
        gateway.clear_local_history().await.unwrap();
        assert!(local.aggregate().await.unwrap().is_empty());
    }
}
