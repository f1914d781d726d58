//! Ordered, persisted collection of queued mutations.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::persistence::{Persistence, QueueMetadata};
use super::{MutationPatch, MutationStatus, QueueStatus, QueuedMutation};
use crate::domain::{MutationId, QueueError};
use crate::ports::Clock;

/// The queue itself.
///
/// Design:
/// - `records` is always sorted by (priority desc, created_at asc); the sort
///   is stable, so equal keys keep insertion order.
/// - Every mutating call re-serializes the whole record set plus metadata
///   before returning.
/// - Storage failures never escape: the store logs them, flags itself as
///   degraded and keeps working in memory. The next successful write clears
///   the flag.
pub struct QueueStore {
    records: Vec<QueuedMutation>,
    persistence: Persistence,
    clock: Arc<dyn Clock>,
    last_processed: Option<DateTime<Utc>>,
    degraded: bool,
}

impl QueueStore {
    /// Build a store from whatever is persisted (possibly nothing).
    ///
    /// Records caught mid-flight by a crash come back as pending: their engine
    /// call may or may not have landed, and the engine is expected to cope
    /// with a replay.
    pub fn load(persistence: Persistence, clock: Arc<dyn Clock>) -> Self {
        let snapshot = persistence.load();
        let mut records = snapshot.records;
        for record in records
            .iter_mut()
            .filter(|r| r.status == MutationStatus::Processing)
        {
            tracing::debug!(mutation_id = %record.id, "restoring interrupted mutation as pending");
            record.status = MutationStatus::Pending;
        }
        records.sort_by(QueuedMutation::drain_order);

        tracing::debug!(count = records.len(), key = persistence.queue_key(), "queue loaded");

        Self {
            records,
            persistence,
            clock,
            last_processed: snapshot.metadata.and_then(|m| m.last_processed),
            degraded: false,
        }
    }

    /// Insert a mutation at its place in drain order and persist.
    pub fn enqueue(&mut self, mutation: QueuedMutation) -> Result<(), QueueError> {
        if self.position(mutation.id).is_some() {
            return Err(QueueError::DuplicateId(mutation.id));
        }
        self.records.push(mutation);
        self.records.sort_by(QueuedMutation::drain_order);
        self.persist();
        Ok(())
    }

    /// Copy of every record in drain order.
    pub fn list_all(&self) -> Vec<QueuedMutation> {
        self.records.clone()
    }

    pub fn get(&self, id: MutationId) -> Option<QueuedMutation> {
        self.position(id).map(|i| self.records[i].clone())
    }

    /// Remove one record. Absent ids are a no-op.
    pub fn remove(&mut self, id: MutationId) -> Option<QueuedMutation> {
        let index = self.position(id)?;
        let removed = self.records.remove(index);
        self.persist();
        Some(removed)
    }

    /// Apply a partial update to one record and persist. Returns the updated
    /// record.
    pub fn update_status(
        &mut self,
        id: MutationId,
        patch: &MutationPatch,
    ) -> Result<QueuedMutation, QueueError> {
        let index = self.position(id).ok_or(QueueError::NotFound(id))?;
        self.records[index].apply(patch);
        let updated = self.records[index].clone();
        self.persist();
        Ok(updated)
    }

    /// Drop every record. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.persist();
        removed
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus::from_records(&self.records)
    }

    /// Stamp the end of a drain pass into the metadata.
    pub fn mark_processed(&mut self) {
        self.last_processed = Some(self.clock.now());
        self.persist();
    }

    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.last_processed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True while the latest write to storage failed.
    pub fn persistence_degraded(&self) -> bool {
        self.degraded
    }

    fn position(&self, id: MutationId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    fn persist(&mut self) {
        let metadata = QueueMetadata {
            last_updated: self.clock.now(),
            total_mutations: self.records.len(),
            last_processed: self.last_processed,
        };
        match self.persistence.save(&self.records, &metadata) {
            Ok(()) => {
                if self.degraded {
                    tracing::info!("queue persistence recovered");
                }
                self.degraded = false;
            }
            Err(error) => {
                if !self.degraded {
                    tracing::warn!(%error, "queue persistence failed, continuing in memory");
                }
                self.degraded = true;
            }
        }
    }
}
