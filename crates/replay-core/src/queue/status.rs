use serde::{Deserialize, Serialize};

use super::{MutationStatus, QueuedMutation};

/// Aggregate counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl QueueStatus {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a QueuedMutation>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.status {
                MutationStatus::Pending => counts.pending += 1,
                MutationStatus::Processing => counts.processing += 1,
                MutationStatus::Success => counts.success += 1,
                MutationStatus::Failed => counts.failed += 1,
            }
            counts.total += 1;
        }
        counts
    }

    /// Nothing left that a drain pass could pick up or that needs attention.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.processing == 0 && self.failed == 0
    }
}
