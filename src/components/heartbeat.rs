//! `heartbeat`: logs a liveness line with the daemon's uptime on a fixed
//! interval.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::component::{Component, ComponentConfig};
use crate::core::errors::{KernelError, Result};
use crate::daemon::AppHandle;
use crate::runtime::{TimerId, TimerQueue};

/// Registry name of the built-in heartbeat.
pub const NAME: &str = "heartbeat";

/// Longest accepted interval: one year.
const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Settings {
    interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

pub struct Heartbeat {
    config: ComponentConfig,
    beats: Arc<AtomicU64>,
    active: RefCell<Option<(TimerQueue, TimerId)>>,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            config: ComponentConfig::default(),
            beats: Arc::new(AtomicU64::new(0)),
            active: RefCell::new(None),
        }
    }
}

/// Factory used by the built-in loader.
pub fn create() -> Box<dyn Component> {
    Box::new(Heartbeat::default())
}

impl Heartbeat {
    /// Heartbeats logged since the component started.
    #[must_use]
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.borrow().is_some()
    }

    fn interval(&self) -> Result<Duration> {
        let settings: Settings = self.config.decode(NAME)?;
        if settings.interval_secs == 0 {
            return Err(KernelError::component(NAME, "interval_secs must be greater than zero"));
        }
        if settings.interval_secs > MAX_INTERVAL_SECS {
            return Err(KernelError::component(
                NAME,
                format!("interval_secs must be at most {MAX_INTERVAL_SECS}"),
            ));
        }
        Ok(Duration::from_secs(settings.interval_secs))
    }
}

impl Component for Heartbeat {
    fn name(&self) -> &str {
        NAME
    }

    fn set_config(&mut self, config: ComponentConfig) {
        self.config = config;
    }

    fn start(&self, app: &AppHandle) -> Result<()> {
        let interval = self.interval()?;
        let timers = app.timers().clone();
        let beats = Arc::clone(&self.beats);
        let handle = app.clone();
        let id = timers.schedule_repeating(interval, move || {
            let beat = beats.fetch_add(1, Ordering::Relaxed) + 1;
            info!(
                beat,
                uptime_secs = handle.uptime().num_seconds(),
                "heartbeat"
            );
        });
        debug!(interval_secs = interval.as_secs(), "heartbeat scheduled");

        if let Some((old_timers, old_id)) = self.active.replace(Some((timers, id))) {
            old_timers.cancel(old_id);
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some((timers, id)) = self.active.take() {
            timers.cancel(id);
            debug!(beats = self.beats(), "heartbeat stopped");
        }
        Ok(())
    }
}
