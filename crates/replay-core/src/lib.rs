//! replay-core
//!
//! Offline mutation queue: records user intents (add / update / mark gotten /
//! delete) while the device is offline, persists them, and replays them
//! through a sync engine once connectivity returns.
//!
//! # Modules
//! - **domain**: ids, mutation types, intents, the mutation factory, errors
//! - **ports**: Clock, IdGenerator, KeyValueStore, SyncEngine
//! - **queue**: records, state machine, retry policy, persistence, ordered store
//! - **app**: processor (`OfflineQueue`), builder, config, notifier, drain loop
//! - **impls**: in-memory and file-backed key-value stores

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{
    DrainLoop, LazyQueue, Notifier, OfflineQueue, OfflineQueueBuilder, ProcessSummary,
    QueueConfig, QueueEvent,
};
pub use domain::{
    ErrorKind, ItemDraft, MutationFactory, MutationId, MutationIntent, MutationType, QueueError,
    StorageError, SyncError, ValidationError,
};
pub use ports::{Clock, Conflict, KeyValueStore, Resolution, SyncEngine};
pub use queue::{MutationStatus, QueueStatus, QueuedMutation, RetryPolicy};
