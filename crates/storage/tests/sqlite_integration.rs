use std::sync::Arc;

use quiz_core::model::AttemptRecord;
use quiz_core::time::fixed_now;
use storage::repository::{AttemptRepository, KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use storage::{HISTORY_KEY, LocalAttemptRepository};

#[tokio::test]
async fn sqlite_kv_roundtrip_and_overwrite() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo.migrate().await.expect("migrations are idempotent");

    assert_eq!(repo.get("missing").await.unwrap(), None);
    repo.set("k", "first").await.unwrap();
    repo.set("k", "second").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("second"));

    repo.remove("k").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_storage_keeps_attempt_history() {
    let storage = Storage::sqlite("sqlite:file:memdb_attempts?mode=memory&cache=shared")
        .await
        .expect("storage");

    storage
        .attempts
        .append_attempt(AttemptRecord::new(30, fixed_now()))
        .await
        .unwrap();
    storage
        .attempts
        .append_attempt(AttemptRecord::new(100, fixed_now()))
        .await
        .unwrap();

    let stats = storage.attempts.aggregate().await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.max, 100);
    assert_eq!(stats.min, 30);

    let raw = storage.kv.get(HISTORY_KEY).await.unwrap().expect("history stored");
    assert!(raw.starts_with('['));
}

#[tokio::test]
async fn separate_keys_keep_separate_histories() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_keys?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    let kv: Arc<dyn KeyValueStore> = Arc::new(repo);

    let a = LocalAttemptRepository::with_key(Arc::clone(&kv), "a");
    let b = LocalAttemptRepository::with_key(kv, "b");
    a.append_attempt(AttemptRecord::new(10, fixed_now()))
        .await
        .unwrap();

    assert_eq!(a.aggregate().await.unwrap().count, 1);
    assert!(b.aggregate().await.unwrap().is_empty());
}
