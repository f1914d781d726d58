//! Mutation state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a queued mutation.
///
/// State transitions:
/// - Pending -> Processing -> Success (record is pruned immediately)
/// - Pending -> Processing -> Pending (transient failure, retry budget left)
/// - Pending -> Processing -> Failed (permanent failure or budget exhausted)
/// - Failed -> Pending (explicit retry request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    /// Waiting for a drain pass.
    Pending,

    /// Handed to the sync engine, outcome not known yet.
    Processing,

    /// Applied. Only ever observed through events; never persisted.
    Success,

    /// Gave up until someone retries it explicitly.
    Failed,
}

impl MutationStatus {
    /// Is `self -> next` a transition the processor may perform?
    pub fn can_transition_to(self, next: MutationStatus) -> bool {
        use MutationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Success)
                | (Processing, Pending)
                | (Processing, Failed)
                | (Failed, Pending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::MutationStatus::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pending, Processing, true)]
    #[case(Processing, Success, true)]
    #[case(Processing, Pending, true)]
    #[case(Failed, Pending, true)]
    #[case(Pending, Success, false)]
    #[case(Success, Pending, false)]
    #[case(Pending, Failed, false)]
    fn transitions(#[case] from: MutationStatus, #[case] to: MutationStatus, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Processing).unwrap(), "\"processing\"");
    }
}
