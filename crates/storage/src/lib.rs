#![forbid(unsafe_code)]

pub mod local;
pub mod repository;
pub mod sqlite;

pub use local::{HISTORY_KEY, LocalAttemptRepository};
pub use repository::{
    AttemptRepository, InMemoryKeyValueStore, KeyValueStore, QuestionFeed, Storage, StorageError,
};
