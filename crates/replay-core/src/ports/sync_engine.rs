//! SyncEngine port - the CRDT/sync engine that actually applies mutations.
//!
//! The queue never touches local or remote stores itself: it hands each
//! mutation's payload to exactly one of `create` / `update` / `delete` and
//! waits for the typed outcome. Conflict resolution is likewise delegated.

//!
//! # 設計原則
//! - 結果は `SyncError` で型付けする (retry 可否は `ErrorKind` で決まる)
//! - conflict の検出・解決はどちらも default 実装を持つ (何もしない)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::SyncError;
use crate::queue::QueuedMutation;

/// A concurrent edit detected by the engine before a mutation is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub reason: String,

    /// Engine-specific view of the remote state, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<serde_json::Value>,
}

impl Conflict {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            remote: None,
        }
    }
}

/// What the engine decided after resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The engine merged the intent itself; nothing left to dispatch.
    Applied,
    /// Go ahead and dispatch the mutation as usual.
    Proceed,
}

#[async_trait]
pub trait SyncEngine: Send + Sync {
    async fn create(&self, payload: &serde_json::Value) -> Result<(), SyncError>;

    async fn update(&self, payload: &serde_json::Value) -> Result<(), SyncError>;

    async fn delete(&self, payload: &serde_json::Value) -> Result<(), SyncError>;

    /// Pre-flight check run before dispatch. Engines without conflict
    /// detection keep the default.
    async fn check_conflict(
        &self,
        _mutation: &QueuedMutation,
    ) -> Result<Option<Conflict>, SyncError> {
        Ok(None)
    }

    async fn resolve_conflict(
        &self,
        _mutation: &QueuedMutation,
        _conflict: Conflict,
    ) -> Result<Resolution, SyncError> {
        Ok(Resolution::Proceed)
    }
}
