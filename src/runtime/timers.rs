//! Default timer source: one-shot and repeating timers on a shared schedule.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::TimerSource;

/// Smallest accepted repeat interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Deadlines further out than this are clamped to it.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Default cap on the wait hint returned by [`TimerQueue::process_timers`].
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(500);

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type Callback = Box<dyn FnMut() + Send>;

/// `from + delay`, clamped to [`FAR_FUTURE`] instead of overflowing.
fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay.min(FAR_FUTURE)).unwrap_or(from)
}

struct Slot {
    key: (Instant, u64),
    interval: Option<Duration>,
    /// `None` while the callback is running.
    callback: Option<Callback>,
}

#[derive(Default)]
struct Schedule {
    next_seq: u64,
    order: BTreeMap<(Instant, u64), TimerId>,
    slots: HashMap<TimerId, Slot>,
}

impl Schedule {
    fn insert(
        &mut self,
        id: TimerId,
        due: Instant,
        interval: Option<Duration>,
        callback: Callback,
    ) {
        let key = (due, self.next_seq);
        self.next_seq += 1;
        self.order.insert(key, id);
        self.slots.insert(
            id,
            Slot {
                key,
                interval,
                callback: Some(callback),
            },
        );
    }

    /// Pop the earliest timer due at or before `now`, taking its callback.
    fn pop_due(&mut self, now: Instant) -> Option<(TimerId, Instant, Callback)> {
        let (&key, &id) = self.order.first_key_value()?;
        if key.0 > now {
            return None;
        }
        self.order.remove(&key);
        let callback = self.slots.get_mut(&id)?.callback.take()?;
        Some((id, key.0, callback))
    }

    /// Put a fired timer back: reschedule it if it repeats, forget it otherwise.
    /// Timers cancelled while their callback ran are already gone.
    fn settle(&mut self, id: TimerId, due: Instant, now: Instant, callback: Callback) {
        let Some(interval) = self.slots.get(&id).map(|slot| slot.interval) else {
            return;
        };
        let Some(interval) = interval else {
            self.slots.remove(&id);
            return;
        };
        let mut next = deadline_after(due, interval);
        if next <= now {
            // Missed ticks are skipped rather than replayed.
            next = deadline_after(now, interval);
        }
        let key = (next, self.next_seq);
        self.next_seq += 1;
        self.order.insert(key, id);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.key = key;
            slot.callback = Some(callback);
        }
    }
}

/// Cloneable, thread-safe timer schedule.
///
/// Timers may be scheduled and cancelled from any thread; callbacks always
/// run on the thread that calls [`TimerSource::process_timers`], outside the
/// internal lock, so a callback may schedule or cancel timers itself.
#[derive(Clone)]
pub struct TimerQueue {
    schedule: Arc<Mutex<Schedule>>,
    ids: Arc<AtomicU64>,
    max_wait: Duration,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schedule: Arc::new(Mutex::new(Schedule::default())),
            ids: Arc::new(AtomicU64::new(1)),
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Cap the wait hint so the loop re-checks its shutdown flag at least
    /// this often.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait.max(MIN_INTERVAL);
        self
    }

    fn next_id(&self) -> TimerId {
        TimerId(self.ids.fetch_add(1, Ordering::Relaxed))
    }

    /// Run `callback` once, `delay` from now.
    pub fn schedule_once(
        &self,
        delay: Duration,
        callback: impl FnOnce() + Send + 'static,
    ) -> TimerId {
        self.schedule_once_at(deadline_after(Instant::now(), delay), callback)
    }

    /// Run `callback` once at `deadline` (or on the next pass if it already passed).
    pub fn schedule_once_at(
        &self,
        deadline: Instant,
        callback: impl FnOnce() + Send + 'static,
    ) -> TimerId {
        let mut callback = Some(callback);
        let id = self.next_id();
        self.schedule.lock().insert(
            id,
            deadline,
            None,
            Box::new(move || {
                if let Some(callback) = callback.take() {
                    callback();
                }
            }),
        );
        id
    }

    /// Run `callback` every `interval`, first one `interval` from now.
    pub fn schedule_repeating(
        &self,
        interval: Duration,
        callback: impl FnMut() + Send + 'static,
    ) -> TimerId {
        let interval = interval.max(MIN_INTERVAL);
        let id = self.next_id();
        let due = deadline_after(Instant::now(), interval);
        self.schedule
            .lock()
            .insert(id, due, Some(interval), Box::new(callback));
        id
    }

    /// Cancel a timer. Returns `false` if it already fired (one-shot) or was
    /// cancelled before.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut schedule = self.schedule.lock();
        let Some(slot) = schedule.slots.remove(&id) else {
            return false;
        };
        schedule.order.remove(&slot.key);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schedule.lock().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the earliest pending timer is due.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.schedule
            .lock()
            .order
            .first_key_value()
            .map(|(key, _)| key.0)
    }
}

impl TimerSource for TimerQueue {
    fn process_timers(&mut self) -> Duration {
        let now = Instant::now();
        let mut fired = 0_usize;
        loop {
            let popped = self.schedule.lock().pop_due(now);
            let Some((id, due, mut callback)) = popped else {
                break;
            };
            callback();
            fired += 1;
            self.schedule.lock().settle(id, due, now, callback);
        }
        if fired > 0 {
            trace!(fired, "timers processed");
        }

        self.next_due().map_or(self.max_wait, |due| {
            due.saturating_duration_since(Instant::now()).min(self.max_wait)
        })
    }
}
