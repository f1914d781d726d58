//! JSON persistence of the queue on top of a `KeyValueStore`.
//!
//! Two keys are used: `<key>` holds the record array and `<key>_metadata`
//! holds `{lastUpdated, totalMutations, lastProcessed}`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::QueuedMutation;
use crate::domain::StorageError;
use crate::ports::KeyValueStore;

pub const DEFAULT_STORAGE_KEY: &str = "offline_mutation_queue";

/// Bookkeeping written next to every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetadata {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,

    pub total_mutations: usize,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_processed: Option<DateTime<Utc>>,
}

/// What was found in storage at startup.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub records: Vec<QueuedMutation>,
    pub metadata: Option<QueueMetadata>,
}

pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    queue_key: String,
    metadata_key: String,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let queue_key = key.into();
        let metadata_key = format!("{queue_key}_metadata");
        Self {
            store,
            queue_key,
            metadata_key,
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub fn metadata_key(&self) -> &str {
        &self.metadata_key
    }

    /// Read the persisted queue.
    ///
    /// Never fails: unreadable or corrupt data is logged and treated as an
    /// empty queue, and corrupt metadata as absent metadata. Keys holding
    /// corrupt JSON are removed so the next start does not trip over them.
    pub fn load(&self) -> Snapshot {
        let records = self
            .read_or_discard::<Vec<QueuedMutation>>(&self.queue_key)
            .unwrap_or_default();
        let metadata = self.read_or_discard::<QueueMetadata>(&self.metadata_key);
        Snapshot { records, metadata }
    }

    /// Write the full record set and its metadata.
    pub fn save(
        &self,
        records: &[QueuedMutation],
        metadata: &QueueMetadata,
    ) -> Result<(), StorageError> {
        let records = serde_json::to_string(records)?;
        let metadata = serde_json::to_string(metadata)?;
        self.store.set(&self.queue_key, &records)?;
        self.store.set(&self.metadata_key, &metadata)
    }

    fn read_or_discard<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read_json(key) {
            Ok(value) => value,
            Err(StorageError::Serialize(error)) => {
                tracing::warn!(%key, %error, "discarding corrupt persisted value");
                if let Err(error) = self.store.remove(key) {
                    tracing::warn!(%key, %error, "corrupt value could not be removed");
                }
                None
            }
            Err(error) => {
                tracing::warn!(%key, %error, "persisted value unreadable, starting without it");
                None
            }
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }
}
