//! Objects whose destruction waits for the next loop iteration.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

/// Parking spot for values that must not be dropped where they are released,
/// e.g. inside the callback that owns them. The event loop drains it once per
/// iteration, before timers run.
#[derive(Clone, Default)]
pub struct DeferredReleases {
    held: Arc<Mutex<Vec<Box<dyn Any + Send>>>>,
}

impl DeferredReleases {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, value: impl Any + Send) {
        self.held.lock().push(Box::new(value));
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.held.lock().len()
    }

    /// Drop everything held so far. Returns how many values were released.
    pub fn release(&self) -> usize {
        let drained = std::mem::take(&mut *self.held.lock());
        // Dropped outside the lock: a destructor may hold something new.
        let count = drained.len();
        drop(drained);
        count
    }
}
