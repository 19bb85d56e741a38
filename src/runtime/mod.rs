//! Timer and event sources driven by the application's event loop.
//!
//! The loop only depends on the two traits below. [`TimerQueue`] and
//! [`EventQueue`] are the default implementations; daemons with their own
//! scheduling plug theirs in through
//! [`ApplicationBuilder`](crate::daemon::ApplicationBuilder).

pub mod deferred;
pub mod events;
pub mod timers;

use std::fmt;
use std::time::{Duration, Instant};

pub use deferred::DeferredReleases;
pub use events::{EventQueue, EventSender};
pub use timers::{TimerId, TimerQueue};

/// Runs due timers and says how long the loop may sleep.
pub trait TimerSource {
    /// Fire every timer that is due and return the time until the next one.
    ///
    /// The value is a hint used only to bound the following event wait.
    fn process_timers(&mut self) -> Duration;
}

/// Supplies events delivered by other threads or the operating system.
pub trait EventSource {
    /// Block until at least one event is available or `deadline` passes, then
    /// return every available event in delivery order.
    fn wait(&mut self, deadline: Instant) -> Vec<Event>;
}

/// A delivered event: a label for diagnostics and a callback run on the
/// loop thread.
pub struct Event {
    label: String,
    callback: Box<dyn FnOnce() + Send>,
}

impl Event {
    pub fn new(label: impl Into<String>, callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            callback: Box::new(callback),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the delivery callback.
    pub fn deliver(self) {
        (self.callback)();
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("label", &self.label).finish_non_exhaustive()
    }
}
