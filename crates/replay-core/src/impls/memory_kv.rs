//! InMemoryKvStore - テスト・一時セッション用の key-value store
//!
//! # 学習ポイント
//! - std `Mutex` と poison からの復帰 (`PoisonError::into_inner`)
//! - byte 数の quota を任意で設定でき、溢れると `QuotaExceeded`
//!   (ブラウザの storage が一杯になった時と同じ失敗の仕方)

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::StorageError;
use crate::ports::KeyValueStore;

#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl Inner {
    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::new();
        store.set_quota(Some(quota_bytes));
        store
    }

    /// Change (or lift) the quota. Existing entries are kept as they are.
    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        self.lock().quota_bytes = quota_bytes;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if let Some(quota) = inner.quota_bytes
            && inner.used_bytes_without(key) + key.len() + value.len() > quota
        {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
            });
        }
        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().entries.remove(key);
        Ok(())
    }
}
