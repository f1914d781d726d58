//! Queue module: records, state machine, retry policy, persistence and the
//! ordered store.

pub mod persistence;
mod record;
mod retry;
mod state;
mod status;
mod store;

pub use persistence::{DEFAULT_STORAGE_KEY, Persistence, QueueMetadata};
pub use record::{MutationPatch, QueuedMutation};
pub use retry::RetryPolicy;
pub use state::MutationStatus;
pub use status::QueueStatus;
pub use store::QueueStore;
