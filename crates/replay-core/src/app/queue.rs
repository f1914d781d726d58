//! OfflineQueue - 処理本体と呼び出し側のトリガー
//!
//! Drain pass:
//! pending/retryable snapshot → backoff gate → processing → conflict check →
//! engine dispatch → success (prune) | failure (retry or permanent) → summary
//!
//! # 設計
//! - store の lock は store 呼び出し 1 回分だけ保持する
//!   (engine の `.await` や backoff sleep をまたがない)
//! - 同時に走る pass は 1 本だけ (`DrainGuard`)
//! - 後で期限が来る仕事を残したら `rescheduled` で `DrainLoop` を起こす

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use super::config::QueueConfig;
use super::notifier::{MutationFailure, Notifier, QueueEvent, StatusChange};
use super::summary::ProcessSummary;
use crate::domain::{
    EngineOp, ErrorKind, MutationFactory, MutationId, MutationIntent, QueueError, SyncError,
};
use crate::ports::{Clock, Conflict, Resolution, SyncEngine};
use crate::queue::{
    MutationPatch, MutationStatus, QueueStatus, QueueStore, QueuedMutation, RetryPolicy,
};

/// Clears the drain flag when the pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct OfflineQueue {
    store: Mutex<QueueStore>,
    engine: Arc<dyn SyncEngine>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    factory: MutationFactory,
    config: QueueConfig,
    policy: RetryPolicy,
    draining: AtomicBool,
    enqueued: Notify,
    rescheduled: Notify,
}

impl OfflineQueue {
    pub(crate) fn new(
        store: QueueStore,
        engine: Arc<dyn SyncEngine>,
        config: QueueConfig,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            engine,
            notifier,
            factory: MutationFactory::with_clock(clock.clone()),
            clock,
            policy: config.retry_policy(),
            config,
            draining: AtomicBool::new(false),
            enqueued: Notify::new(),
            rescheduled: Notify::new(),
        }
    }

    /// Add a prebuilt mutation. Rejects ids that are already queued.
    pub async fn enqueue(&self, mutation: QueuedMutation) -> Result<MutationId, QueueError> {
        let id = mutation.id;
        let mutation_type = mutation.mutation_type;
        self.store.lock().await.enqueue(mutation)?;

        tracing::info!(mutation_id = %id, %mutation_type, "mutation enqueued");
        self.enqueued.notify_one();
        Ok(id)
    }

    /// Validate `intent`, build the record and enqueue it.
    pub async fn record(&self, intent: MutationIntent) -> Result<MutationId, QueueError> {
        let mutation = self.factory.build(intent)?;
        self.enqueue(mutation).await
    }

    /// Run one drain pass over every eligible record.
    ///
    /// Returns immediately (with `skipped_reentrant` set and no events) when
    /// another pass is already running.
    pub async fn process_queue(&self) -> ProcessSummary {
        let summary = self.drain().await;
        if summary.next_retry_in.is_some() {
            self.rescheduled.notify_one();
        }
        summary
    }

    /// One pass without the reschedule signal; `DrainLoop` sleeps on the
    /// summary's `next_retry_in` itself.
    pub(crate) async fn drain(&self) -> ProcessSummary {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("drain already running, skipping");
            return ProcessSummary::reentrant();
        };

        let snapshot = self.store.lock().await.list_all();
        let mut summary = ProcessSummary::default();

        for candidate in snapshot {
            // the record may have been removed or changed since the snapshot
            let Some(mutation) = self.store.lock().await.get(candidate.id) else {
                continue;
            };
            if !mutation.is_eligible(self.policy.max_retries) {
                continue;
            }
            if !self.wait_until_due(&mutation).await {
                summary.deferred += 1;
                continue;
            }
            self.attempt(mutation, &mut summary).await;
        }

        self.finish_pass(summary).await
    }

    /// Move every failed record back to pending (retry count is kept, the
    /// permanent flag is cleared), then drain.
    pub async fn retry_failed(&self) -> ProcessSummary {
        let failed: Vec<QueuedMutation> = self
            .store
            .lock()
            .await
            .list_all()
            .into_iter()
            .filter(|m| m.status == MutationStatus::Failed)
            .collect();

        for mutation in &failed {
            self.transition(
                mutation,
                MutationPatch::status(MutationStatus::Pending).with_permanent(false),
            )
            .await;
        }
        tracing::info!(count = failed.len(), "failed mutations reset to pending");

        let summary = self.process_queue().await;
        // the running pass may not be the loop's
        if summary.skipped_reentrant && !failed.is_empty() {
            self.rescheduled.notify_one();
        }
        summary
    }

    /// Drop a mutation. An in-flight engine call is not interrupted, but its
    /// outcome will not bring the record back.
    pub async fn remove_mutation(&self, id: MutationId) -> Option<QueuedMutation> {
        let removed = self.store.lock().await.remove(id);
        if removed.is_some() {
            tracing::info!(mutation_id = %id, "mutation removed");
        }
        removed
    }

    pub async fn clear_queue(&self) -> usize {
        let removed = self.store.lock().await.clear();
        tracing::info!(count = removed, "queue cleared");
        removed
    }

    /// Detached copy of every record, in drain order.
    pub async fn get_queued_mutations(&self) -> Vec<QueuedMutation> {
        self.store.lock().await.list_all()
    }

    pub async fn get_status(&self) -> QueueStatus {
        self.store.lock().await.status()
    }

    pub async fn get_mutation(&self, id: MutationId) -> Option<QueuedMutation> {
        self.store.lock().await.get(id)
    }

    pub async fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.store.lock().await.last_processed()
    }

    pub async fn persistence_degraded(&self) -> bool {
        self.store.lock().await.persistence_degraded()
    }

    /// True while a drain pass is running.
    pub fn is_processing(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Factory stamping records with this queue's clock.
    pub fn factory(&self) -> &MutationFactory {
        &self.factory
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Resolves after the next successful `enqueue`. An enqueue that happened
    /// while nobody was waiting is remembered for the next caller.
    pub async fn wait_for_enqueue(&self) {
        self.enqueued.notified().await;
    }

    /// Resolves when a pass outside `DrainLoop` left work that becomes due
    /// later, or `retry_failed` reset records while another pass was running.
    pub async fn wait_for_reschedule(&self) {
        self.rescheduled.notified().await;
    }

    /// `false` when the record's backoff is longer than we are willing to
    /// sleep through in this pass.
    async fn wait_until_due(&self, mutation: &QueuedMutation) -> bool {
        let remaining =
            self.policy
                .remaining(mutation.retry_count, mutation.last_attempt_at, self.clock.now());
        if remaining.is_zero() {
            return true;
        }
        if remaining > self.config.max_inline_wait() {
            tracing::debug!(
                mutation_id = %mutation.id,
                retry_count = mutation.retry_count,
                ?remaining,
                "backoff not elapsed, deferring"
            );
            return false;
        }
        tokio::time::sleep(remaining).await;
        true
    }

    async fn attempt(&self, mutation: QueuedMutation, summary: &mut ProcessSummary) {
        let Some(mutation) = self
            .transition(&mutation, MutationPatch::status(MutationStatus::Processing))
            .await
        else {
            return;
        };
        summary.processed += 1;

        match self.execute(&mutation).await {
            Ok(()) => self.succeed(mutation, summary).await,
            Err(error) => self.fail(mutation, error, summary).await,
        }
    }

    async fn execute(&self, mutation: &QueuedMutation) -> Result<(), SyncError> {
        if self.config.check_conflicts
            && let Some(conflict) = self.engine.check_conflict(mutation).await?
        {
            tracing::info!(
                mutation_id = %mutation.id,
                reason = %conflict.reason,
                "conflict detected, delegating resolution"
            );
            if self.engine.resolve_conflict(mutation, conflict).await? == Resolution::Applied {
                return Ok(());
            }
        }

        match self.dispatch(mutation).await {
            Err(SyncError::Conflict(reason)) => {
                tracing::info!(
                    mutation_id = %mutation.id,
                    %reason,
                    "engine reported conflict, delegating resolution"
                );
                match self
                    .engine
                    .resolve_conflict(mutation, Conflict::new(reason))
                    .await?
                {
                    Resolution::Applied => Ok(()),
                    Resolution::Proceed => self.dispatch(mutation).await,
                }
            }
            other => other,
        }
    }

    async fn dispatch(&self, mutation: &QueuedMutation) -> Result<(), SyncError> {
        match mutation.mutation_type.engine_op() {
            EngineOp::Create => self.engine.create(&mutation.payload).await,
            EngineOp::Update => self.engine.update(&mutation.payload).await,
            EngineOp::Delete => self.engine.delete(&mutation.payload).await,
        }
    }

    async fn succeed(&self, mutation: QueuedMutation, summary: &mut ProcessSummary) {
        summary.succeeded += 1;

        let removed = self.store.lock().await.remove(mutation.id);
        if removed.is_none() {
            tracing::debug!(mutation_id = %mutation.id, "mutation removed while in flight");
            return;
        }
        tracing::debug!(
            mutation_id = %mutation.id,
            mutation_type = %mutation.mutation_type,
            "mutation synced"
        );

        self.notifier.emit(&QueueEvent::StatusChanged(StatusChange {
            id: mutation.id,
            mutation_type: mutation.mutation_type,
            from: MutationStatus::Processing,
            to: MutationStatus::Success,
        }));
        let mut synced = mutation;
        synced.status = MutationStatus::Success;
        self.notifier.emit(&QueueEvent::MutationSucceeded(synced));
    }

    async fn fail(&self, mutation: QueuedMutation, error: SyncError, summary: &mut ProcessSummary) {
        let retry_count = mutation.retry_count.saturating_add(1);
        let permanent = match error.kind() {
            ErrorKind::Permanent => true,
            // a conflict the engine could not settle is retried like a 5xx
            ErrorKind::Transient | ErrorKind::Conflict => self.policy.is_exhausted(retry_count),
        };
        let status = if permanent {
            MutationStatus::Failed
        } else {
            MutationStatus::Pending
        };

        summary.failed += 1;
        if permanent {
            summary.permanently_failed += 1;
        }

        let patch = MutationPatch::status(status)
            .with_retry_count(retry_count)
            .with_error(error.to_string())
            .with_attempt_at(self.clock.now())
            .with_permanent(permanent);
        let Some(updated) = self.transition(&mutation, patch).await else {
            return;
        };

        if permanent {
            tracing::error!(
                mutation_id = %updated.id,
                mutation_type = %updated.mutation_type,
                retry_count,
                %error,
                "mutation failed permanently"
            );
        } else {
            tracing::warn!(
                mutation_id = %updated.id,
                mutation_type = %updated.mutation_type,
                retry_count,
                %error,
                "mutation failed, will retry"
            );
        }

        self.notifier.emit(&QueueEvent::MutationFailed(MutationFailure {
            mutation: updated,
            error,
            permanent,
        }));
    }

    /// Apply `patch`, persist, then announce the status change. `None` if the
    /// record is gone.
    async fn transition(
        &self,
        mutation: &QueuedMutation,
        patch: MutationPatch,
    ) -> Option<QueuedMutation> {
        if let Some(to) = patch.status
            && !mutation.status.can_transition_to(to)
        {
            tracing::warn!(
                mutation_id = %mutation.id,
                from = %mutation.status,
                %to,
                "unexpected status transition"
            );
        }
        let result = self.store.lock().await.update_status(mutation.id, &patch);
        let updated = match result {
            Ok(updated) => updated,
            Err(error) => {
                tracing::debug!(mutation_id = %mutation.id, %error, "mutation removed while in flight");
                return None;
            }
        };

        tracing::debug!(
            mutation_id = %updated.id,
            from = %mutation.status,
            to = %updated.status,
            "mutation status changed"
        );
        self.notifier.emit(&QueueEvent::StatusChanged(StatusChange {
            id: updated.id,
            mutation_type: updated.mutation_type,
            from: mutation.status,
            to: updated.status,
        }));
        Some(updated)
    }

    async fn finish_pass(&self, mut summary: ProcessSummary) -> ProcessSummary {
        let records = {
            let mut store = self.store.lock().await;
            // an empty pass leaves storage untouched
            if summary.processed > 0 {
                store.mark_processed();
            }
            store.list_all()
        };

        let now = self.clock.now();
        summary.pending = records
            .iter()
            .filter(|m| m.status == MutationStatus::Pending)
            .map(|m| m.id)
            .collect();
        summary.next_retry_in = records
            .iter()
            .filter(|m| m.is_eligible(self.policy.max_retries))
            .map(|m| self.policy.remaining(m.retry_count, m.last_attempt_at, now))
            .min();

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            deferred = summary.deferred,
            pending = summary.pending.len(),
            next_retry_ms = summary.next_retry_in.map(|d| d.as_millis() as u64),
            "queue drain finished"
        );

        self.notifier.emit(&QueueEvent::QueueProcessed(summary.clone()));
        summary
    }
}
