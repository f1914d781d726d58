//! OfflineQueueBuilder - `OfflineQueue` の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン (storage / clock / notifier は省略可能)
//! - 起動時検証 (Fail-fast): sync engine の欠落や不整合な config は
//!   最初の drain ではなく `build()` で報告する

use std::sync::Arc;

use super::config::{ConfigError, QueueConfig};
use super::notifier::Notifier;
use super::queue::OfflineQueue;
use crate::impls::InMemoryKvStore;
use crate::ports::{Clock, KeyValueStore, SyncEngine, SystemClock};
use crate::queue::{Persistence, QueueStore};

/// # Example
/// ```ignore
/// let queue = OfflineQueueBuilder::new()
///     .config(QueueConfig::from_json_str(&json)?)
///     .storage(Arc::new(FileKvStore::open("./state")?))
///     .sync_engine(engine)
///     .build()?;
/// ```
#[derive(Default)]
pub struct OfflineQueueBuilder {
    config: QueueConfig,
    engine: Option<Arc<dyn SyncEngine>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    notifier: Option<Notifier>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no sync engine configured; call `sync_engine()` before `build()`")]
    MissingSyncEngine,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl OfflineQueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sync_engine(mut self, engine: Arc<dyn SyncEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Defaults to a fresh `InMemoryKvStore` (nothing survives a restart).
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share a notifier whose listeners were registered up front.
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate, load the persisted queue and assemble the processor.
    pub fn build(self) -> Result<OfflineQueue, BuildError> {
        self.config.validate()?;
        let engine = self.engine.ok_or(BuildError::MissingSyncEngine)?;

        let storage = self.storage.unwrap_or_else(|| {
            tracing::debug!("no storage configured, queue will not survive a restart");
            Arc::new(InMemoryKvStore::new())
        });
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let persistence = Persistence::new(storage, self.config.storage_key.clone());
        let store = QueueStore::load(persistence, clock.clone());

        Ok(OfflineQueue::new(
            store,
            engine,
            self.config,
            clock,
            self.notifier.unwrap_or_default(),
        ))
    }
}
