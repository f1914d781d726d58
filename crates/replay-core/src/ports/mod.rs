//! Ports - interfaces to everything outside the queue.
//!
//! Each trait hides an external system (wall clock, key-value storage, the
//! sync engine) so the queue core stays storage- and backend-agnostic and can
//! be tested in isolation.

pub mod clock;
pub mod id_generator;
pub mod kv_store;
pub mod sync_engine;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::kv_store::KeyValueStore;
pub use self::sync_engine::{Conflict, Resolution, SyncEngine};
