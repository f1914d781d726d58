//! Queued mutation record and partial updates to it.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MutationStatus;
use crate::domain::{MutationId, MutationType};

/// One pending change-of-intent.
///
/// This is exactly what gets persisted: the JSON shape (camelCase, `type`,
/// millisecond timestamps) is the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: MutationId,

    #[serde(rename = "type")]
    pub mutation_type: MutationType,

    pub payload: serde_json::Value,

    pub priority: i32,

    pub status: MutationStatus,

    pub retry_count: u32,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// Set once retrying cannot help (client error, or budget exhausted).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub permanent: bool,
}

impl QueuedMutation {
    /// A fresh pending record. Priority is derived from the type.
    pub fn new(
        id: MutationId,
        mutation_type: MutationType,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            mutation_type,
            payload,
            priority: mutation_type.priority(),
            status: MutationStatus::Pending,
            retry_count: 0,
            created_at,
            last_error: None,
            last_attempt_at: None,
            permanent: false,
        }
    }

    /// Drain order: priority descending, then creation time ascending.
    pub fn drain_order(a: &Self, b: &Self) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    }

    /// May a drain pass pick this record up (ignoring backoff)?
    ///
    /// Pending records always qualify, even past the retry budget: they only
    /// get there through an explicit retry request.
    pub fn is_eligible(&self, max_retries: u32) -> bool {
        match self.status {
            MutationStatus::Pending => true,
            MutationStatus::Failed => !self.permanent && self.retry_count < max_retries,
            MutationStatus::Processing | MutationStatus::Success => false,
        }
    }

    pub fn apply(&mut self, patch: &MutationPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(retry_count) = patch.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(last_error) = &patch.last_error {
            self.last_error = last_error.clone();
        }
        if let Some(last_attempt_at) = patch.last_attempt_at {
            self.last_attempt_at = Some(last_attempt_at);
        }
        if let Some(permanent) = patch.permanent {
            self.permanent = permanent;
        }
    }
}

/// Partial update applied by `QueueStore::update_status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPatch {
    pub status: Option<MutationStatus>,
    pub retry_count: Option<u32>,
    /// `Some(None)` clears the error.
    pub last_error: Option<Option<String>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub permanent: Option<bool>,
}

impl MutationPatch {
    pub fn status(status: MutationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }

    pub fn with_attempt_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_attempt_at = Some(at);
        self
    }

    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent = Some(permanent);
        self
    }
}
