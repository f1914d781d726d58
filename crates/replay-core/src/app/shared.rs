//! Process-wide accessor for hosts that want one queue without threading an
//! `Arc` through every layer. Nothing in this crate depends on it.

use std::sync::{Arc, Mutex, PoisonError};

use super::builder::BuildError;
use super::queue::OfflineQueue;

type Init = Box<dyn Fn() -> Result<OfflineQueue, BuildError> + Send + Sync>;

/// Builds the queue on first `get()` and hands out the same instance until
/// `take()` tears it down.
///
/// # Example
/// ```ignore
/// static QUEUE: LazyLock<LazyQueue> = LazyLock::new(|| {
///     LazyQueue::new(|| OfflineQueueBuilder::new().sync_engine(engine()).build())
/// });
/// let queue = QUEUE.get()?;
/// // logout / tests
/// QUEUE.take();
/// ```
pub struct LazyQueue {
    slot: Mutex<Option<Arc<OfflineQueue>>>,
    init: Init,
}

impl LazyQueue {
    pub fn new(
        init: impl Fn() -> Result<OfflineQueue, BuildError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            slot: Mutex::new(None),
            init: Box::new(init),
        }
    }

    /// The shared queue, building it if this is the first call.
    ///
    /// A failed build is not memoized; the next call tries again. The build
    /// runs under the slot lock, so racing first calls build only once.
    pub fn get(&self) -> Result<Arc<OfflineQueue>, BuildError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = slot.as_ref() {
            return Ok(queue.clone());
        }
        let built = Arc::new((self.init)()?);
        *slot = Some(built.clone());
        Ok(built)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Forget the shared instance. The next `get()` builds a new one;
    /// holders of the old `Arc` keep it alive until they drop it.
    pub fn take(&self) -> Option<Arc<OfflineQueue>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
