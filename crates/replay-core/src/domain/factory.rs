//! Mutation factory: turns validated intents into queue records.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use super::errors::ValidationError;
use super::intent::{ItemDraft, MutationIntent};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::queue::QueuedMutation;

/// Builds `QueuedMutation`s from intents.
///
/// Does not touch the queue or storage. The only state it keeps is the last
/// timestamp it handed out, so `created_at` never goes backwards even if the
/// wall clock does.
pub struct MutationFactory {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    last_created_at: Mutex<Option<DateTime<Utc>>>,
}

impl MutationFactory {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            clock,
            ids,
            last_created_at: Mutex::new(None),
        }
    }

    /// Factory stamping ids and timestamps from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        Self::new(clock, ids)
    }

    pub fn build(&self, intent: MutationIntent) -> Result<QueuedMutation, ValidationError> {
        intent.validate()?;
        let mutation_type = intent.mutation_type();
        let payload = intent.into_payload()?;
        Ok(QueuedMutation::new(
            self.ids.generate_mutation_id(),
            mutation_type,
            payload,
            self.next_created_at(),
        ))
    }

    pub fn add_item(
        &self,
        list_id: impl Into<String>,
        item: ItemDraft,
    ) -> Result<QueuedMutation, ValidationError> {
        self.build(MutationIntent::Add {
            list_id: list_id.into(),
            item,
        })
    }

    pub fn update_item(
        &self,
        item_id: impl Into<String>,
        changes: serde_json::Value,
    ) -> Result<QueuedMutation, ValidationError> {
        self.build(MutationIntent::Update {
            item_id: item_id.into(),
            list_id: None,
            changes,
        })
    }

    pub fn mark_gotten(
        &self,
        item_id: impl Into<String>,
        gotten: bool,
    ) -> Result<QueuedMutation, ValidationError> {
        self.build(MutationIntent::MarkGotten {
            item_id: item_id.into(),
            gotten,
        })
    }

    pub fn delete_item(&self, item_id: impl Into<String>) -> Result<QueuedMutation, ValidationError> {
        self.build(MutationIntent::Delete {
            item_id: item_id.into(),
        })
    }

    /// Millisecond-truncated (that is what gets persisted), never earlier
    /// than the previous one.
    fn next_created_at(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let now = now
            .duration_trunc(TimeDelta::milliseconds(1))
            .unwrap_or(now);
        let mut last = self
            .last_created_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let created_at = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(created_at);
        created_at
    }
}

impl Default for MutationFactory {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}
