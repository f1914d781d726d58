//! Impls - key-value store implementations of the ports.
//!
//! - **InMemoryKvStore**: tests and ephemeral sessions, optional byte quota
//! - **FileKvStore**: one JSON file per key in a directory

pub mod file_kv;
pub mod memory_kv;

pub use self::file_kv::FileKvStore;
pub use self::memory_kv::InMemoryKvStore;
