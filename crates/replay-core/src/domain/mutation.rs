use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of user intent a queued mutation carries.
///
/// Determines both the sync-engine operation it is replayed as and its
/// priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationType {
    Add,
    Update,
    MarkGotten,
    Delete,
}

/// Which sync-engine operation a mutation is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Create,
    Update,
    Delete,
}

impl MutationType {
    pub const DELETE_PRIORITY: i32 = 100;
    pub const UPDATE_PRIORITY: i32 = 50;
    pub const ADD_PRIORITY: i32 = 10;

    /// Higher runs first. Deletes go before updates so a later update never
    /// resurrects an item the user already removed.
    pub fn priority(self) -> i32 {
        match self {
            Self::Delete => Self::DELETE_PRIORITY,
            Self::Update | Self::MarkGotten => Self::UPDATE_PRIORITY,
            Self::Add => Self::ADD_PRIORITY,
        }
    }

    pub fn engine_op(self) -> EngineOp {
        match self {
            Self::Add => EngineOp::Create,
            Self::Update | Self::MarkGotten => EngineOp::Update,
            Self::Delete => EngineOp::Delete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::MarkGotten => "markGotten",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
