//! IdGenerator port - mutation id generation.
//!
//! Abstracted as a trait so tests can pin the timestamp part of the id.

use ulid::Ulid;

use crate::domain::ids::MutationId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_mutation_id(&self) -> MutationId;
}

/// ULID generator stamped with the given clock.
///
/// Ids carry 80 random bits, so two ids minted in the same millisecond still
/// differ.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_mutation_id(&self) -> MutationId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        MutationId::from(ulid)
    }
}
