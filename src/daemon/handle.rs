//! Shareable application context and the process-wide instance slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::runtime::{DeferredReleases, EventQueue, EventSender, TimerQueue};

/// The running application, if any. Written only when `run` starts and ends.
static INSTANCE: RwLock<Option<AppHandle>> = parking_lot::const_rwlock(None);

struct Shared {
    shutting_down: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
    interrupt_reported: AtomicBool,
    debugging: bool,
    main_thread: OnceLock<ThreadId>,
    arguments: OnceLock<Vec<String>>,
    started_at: DateTime<Utc>,
    timers: TimerQueue,
    events: EventSender,
    deferred: DeferredReleases,
}

/// Cheap, thread-safe view of an application.
///
/// Components receive one in [`Component::start`](crate::component::Component::start)
/// and use it to schedule timers, post events, defer releases, and request
/// shutdown. It never grants access to the component registry, which stays
/// with the `Application` on the main thread.
#[derive(Clone)]
pub struct AppHandle {
    shared: Arc<Shared>,
}

impl AppHandle {
    pub(crate) fn new(debugging: bool, timers: TimerQueue, events: EventSender) -> Self {
        Self {
            shared: Arc::new(Shared {
                shutting_down: Arc::new(AtomicBool::new(false)),
                interrupted: Arc::new(AtomicBool::new(false)),
                interrupt_reported: AtomicBool::new(false),
                debugging,
                main_thread: OnceLock::new(),
                arguments: OnceLock::new(),
                started_at: Utc::now(),
                timers,
                events,
                deferred: DeferredReleases::new(),
            }),
        }
    }

    /// A handle that belongs to no running application, for exercising
    /// components outside a daemon.
    #[must_use]
    pub fn detached() -> Self {
        let events = EventQueue::new();
        Self::new(false, TimerQueue::new(), events.sender())
    }

    /// Request shutdown. Idempotent; a single atomic store.
    pub fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    /// Fixed when the application was constructed.
    #[must_use]
    pub fn is_debugging(&self) -> bool {
        self.shared.debugging
    }

    /// True iff the caller runs on the thread that entered `run`.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        self.shared.main_thread.get() == Some(&thread::current().id())
    }

    /// Command-line arguments captured by `run`, including argv[0].
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        self.shared.arguments.get().map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn uptime(&self) -> chrono::TimeDelta {
        Utc::now() - self.shared.started_at
    }

    #[must_use]
    pub fn timers(&self) -> &TimerQueue {
        &self.shared.timers
    }

    #[must_use]
    pub fn events(&self) -> &EventSender {
        &self.shared.events
    }

    #[must_use]
    pub fn deferred(&self) -> &DeferredReleases {
        &self.shared.deferred
    }

    /// Keep `value` alive until the start of the next loop pass.
    pub fn defer_release(&self, value: impl std::any::Any + Send) {
        self.shared.deferred.hold(value);
    }

    #[must_use]
    pub fn same_app(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.shutting_down)
    }

    pub(crate) fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.interrupted)
    }

    /// True once an interrupt has been delivered. Never reset: the SIGINT
    /// escalation handler watches the same flag.
    pub(crate) fn was_interrupted(&self) -> bool {
        self.shared.interrupted.load(Ordering::SeqCst)
    }

    /// True the first time it is called after an interrupt.
    pub(crate) fn report_interrupt(&self) -> bool {
        self.was_interrupted() && !self.shared.interrupt_reported.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn mark_main_thread(&self) {
        assert!(
            self.shared.main_thread.set(thread::current().id()).is_ok(),
            "Application::run entered twice on the same application"
        );
    }

    pub(crate) fn set_arguments(&self, arguments: Vec<String>) {
        // `mark_main_thread` already rejected a second run.
        let _ = self.shared.arguments.set(arguments);
    }
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("shutting_down", &self.is_shutting_down())
            .field("debugging", &self.shared.debugging)
            .field("started_at", &self.shared.started_at)
            .finish_non_exhaustive()
    }
}

/// The running application, or `None` if nothing is running or the running
/// application has begun shutting down.
#[must_use]
pub fn get_instance() -> Option<AppHandle> {
    INSTANCE
        .read()
        .as_ref()
        .filter(|handle| !handle.is_shutting_down())
        .cloned()
}

/// Request shutdown of the running application, if any.
pub fn shutdown() {
    if let Some(handle) = INSTANCE.read().as_ref() {
        handle.shutdown();
    }
}

/// Occupies the instance slot for the duration of `run`.
pub(crate) struct InstanceGuard {
    handle: AppHandle,
}

impl InstanceGuard {
    /// Claim the slot. Panics if another application is running.
    pub(crate) fn install(handle: &AppHandle) -> Self {
        let mut slot = INSTANCE.write();
        assert!(
            slot.is_none(),
            "an Application is already running in this process"
        );
        *slot = Some(handle.clone());
        Self {
            handle: handle.clone(),
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let mut slot = INSTANCE.write();
        if slot.as_ref().is_some_and(|live| live.same_app(&self.handle)) {
            *slot = None;
        }
    }
}
