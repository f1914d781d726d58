use std::time::Duration;

use crate::domain::MutationId;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSummary {
    /// Mutations handed to the sync engine during the pass.
    pub processed: usize,
    pub succeeded: usize,
    /// Failed attempts, retryable or not.
    pub failed: usize,
    /// Of `failed`, those that ended the pass permanently failed.
    pub permanently_failed: usize,
    /// Eligible records skipped because their backoff was not over yet.
    pub deferred: usize,
    /// Records still pending after the pass, in drain order.
    pub pending: Vec<MutationId>,
    /// When the earliest remaining record becomes due, if any.
    pub next_retry_in: Option<Duration>,
    /// Another drain was already running; this call did nothing.
    pub skipped_reentrant: bool,
}

impl ProcessSummary {
    pub(crate) fn reentrant() -> Self {
        Self {
            skipped_reentrant: true,
            ..Self::default()
        }
    }
}
