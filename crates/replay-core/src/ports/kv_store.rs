//! KeyValueStore port - the persistence substrate.
//!
//! A synchronous string-keyed blob store (browser local storage, a directory
//! of files, an embedded database...). Writes may fail with
//! `StorageError::QuotaExceeded`.

use crate::domain::StorageError;

/// # 設計原則
/// - 同期 API (呼び出しは `QueueStore` の lock 内で完結する)
/// - 値は文字列のみ (JSON 化は `Persistence` の責務)
/// - `remove` は壊れた値の破棄に使う
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
