//! The cooperative event loop.

use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::Application;

/// Longest single wait when a timer source's hint cannot be represented as
/// an `Instant`. The loop simply waits again.
const FAR_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

impl Application {
    /// Drive timers and events until shutdown is requested.
    ///
    /// Each pass releases deferred objects, fires due timers, re-checks the
    /// shutdown flag, then waits for events no longer than the timer hint
    /// and delivers every event received, in order. Returns once the flag
    /// is observed; components stay registered until the application drops.
    ///
    /// # Panics
    ///
    /// If called off the main thread.
    pub fn run_event_loop(&mut self) {
        self.assert_main_thread("run_event_loop");
        info!("event loop started");

        let mut passes: u64 = 0;
        let mut delivered: u64 = 0;
        while !self.handle.is_shutting_down() {
            let released = self.handle.deferred().release();
            if released > 0 {
                trace!(released, "deferred objects released");
            }

            let sleep = self.timer_source.process_timers();

            // A timer callback may have asked to stop.
            if self.handle.is_shutting_down() {
                break;
            }

            for event in self.event_source.wait(wait_deadline(Instant::now(), sleep)) {
                trace!(event = event.label(), "delivering event");
                event.deliver();
                delivered += 1;
            }
            passes += 1;
        }

        if self.handle.report_interrupt() {
            info!("interrupt received, shutting down (interrupt again to terminate immediately)");
        }
        self.handle.deferred().release();
        debug!(passes, delivered, "event loop statistics");
        info!("event loop stopped");
    }
}

/// Deadline for one event wait, clamped so an oversized hint never overflows.
fn wait_deadline(now: Instant, sleep: Duration) -> Instant {
    now.checked_add(sleep.min(FAR_WAIT)).unwrap_or(now)
}
