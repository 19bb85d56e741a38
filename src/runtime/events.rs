//! Default event source: a channel that any thread can post events into.

use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::{Event, EventSource};

/// Posting side of an [`EventQueue`]. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Queue `event` for delivery on the loop thread.
    ///
    /// Returns `false` if the queue no longer exists.
    pub fn post(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Queue a callback under `label`.
    pub fn post_fn(
        &self,
        label: impl Into<String>,
        callback: impl FnOnce() + Send + 'static,
    ) -> bool {
        self.post(Event::new(label, callback))
    }
}

/// Unbounded FIFO of events, drained by the event loop.
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl EventSource for EventQueue {
    fn wait(&mut self, deadline: Instant) -> Vec<Event> {
        let first = match self.rx.recv_deadline(deadline) {
            Ok(event) => event,
            // The queue keeps its own sender, so it never disconnects.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return Vec::new(),
        };
        let mut events = vec![first];
        events.extend(self.rx.try_iter());
        events
    }
}
