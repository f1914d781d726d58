//! App - the processor and its surroundings.
//!
//! # Components
//! - **OfflineQueue**: drain pass, retry/backoff, conflict delegation, trigger surface
//! - **OfflineQueueBuilder**: wiring and fail-fast validation
//! - **Notifier**: lifecycle callbacks
//! - **DrainLoop**: connectivity-driven background drain
//! - **LazyQueue**: optional process-wide accessor

pub mod builder;
pub mod config;
pub mod drain_loop;
pub mod notifier;
pub mod queue;
pub mod shared;
mod summary;

pub use self::builder::{BuildError, OfflineQueueBuilder};
pub use self::config::{ConfigError, QueueConfig};
pub use self::drain_loop::DrainLoop;
pub use self::notifier::{MutationFailure, Notifier, QueueEvent, StatusChange, Subscription};
pub use self::queue::OfflineQueue;
pub use self::shared::LazyQueue;
pub use self::summary::ProcessSummary;
