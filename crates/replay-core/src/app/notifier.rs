//! Notifier - lifecycle callbacks for queue subscribers (UI layer etc.).
//!
//! Listeners run synchronously, in registration order, after the state change
//! they describe has been written to storage. A panicking listener is caught
//! and logged; it never takes down the drain or the other listeners.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::summary::ProcessSummary;
use crate::domain::{MutationId, MutationType, SyncError};
use crate::queue::{MutationStatus, QueuedMutation};

/// A failed attempt.
#[derive(Debug, Clone)]
pub struct MutationFailure {
    /// The record as stored after the failure (retry count already bumped).
    pub mutation: QueuedMutation,
    pub error: SyncError,
    /// `false` means the mutation will be retried on a later pass.
    pub permanent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub id: MutationId,
    pub mutation_type: MutationType,
    pub from: MutationStatus,
    pub to: MutationStatus,
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    MutationSucceeded(QueuedMutation),
    MutationFailed(MutationFailure),
    QueueProcessed(ProcessSummary),
    StatusChanged(StatusChange),
}

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Fan-out point for queue events. Cheap to clone; clones share listeners.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
}

/// Handle returned by every registration.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stop receiving events. Returns `false` if the listener was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = lock(&registry);
        let before = registry.listeners.len();
        registry.listeners.retain(|(id, _)| *id != self.id);
        registry.listeners.len() != before
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe(&self, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn on_mutation_success(
        &self,
        listener: impl Fn(&QueuedMutation) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(move |event| {
            if let QueueEvent::MutationSucceeded(mutation) = event {
                listener(mutation);
            }
        })
    }

    pub fn on_mutation_failed(
        &self,
        listener: impl Fn(&MutationFailure) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(move |event| {
            if let QueueEvent::MutationFailed(failure) = event {
                listener(failure);
            }
        })
    }

    pub fn on_queue_processed(
        &self,
        listener: impl Fn(&ProcessSummary) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(move |event| {
            if let QueueEvent::QueueProcessed(summary) = event {
                listener(summary);
            }
        })
    }

    pub fn on_status_change(
        &self,
        listener: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(move |event| {
            if let QueueEvent::StatusChanged(change) = event {
                listener(change);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    /// Deliver `event` to every listener.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may subscribe or unsubscribe from inside a callback.
    pub fn emit(&self, event: &QueueEvent) {
        let listeners: Vec<(u64, Listener)> = lock(&self.registry).listeners.clone();
        for (id, listener) in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                tracing::error!(
                    subscription = id,
                    panic = panic_message(payload.as_ref()),
                    "queue event listener panicked"
                );
            }
        }
    }
}
