//! Domain model: ids, mutation types, intents, the mutation factory and the
//! error taxonomy.

pub mod errors;
pub mod factory;
pub mod ids;
pub mod intent;
pub mod mutation;

pub use errors::{ErrorKind, QueueError, StorageError, SyncError, ValidationError};
pub use factory::MutationFactory;
pub use ids::MutationId;
pub use intent::{ItemDraft, MutationIntent};
pub use mutation::{EngineOp, MutationType};
