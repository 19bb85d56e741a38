//! Process signal wiring for a running application.
//!
//! The first SIGINT only sets the application's shutdown and interrupt flags;
//! the loop notices them on its next pass. A second SIGINT, arriving while
//! the first is still unobserved or after shutdown began, falls through to the
//! default action and terminates the process. Once the guard drops, SIGINT
//! performs its default action again. SIGPIPE is ignored so broken pipes
//! surface as I/O errors instead of killing the daemon.

#![allow(missing_docs)]

#[cfg(feature = "daemon")]
use std::sync::Arc;
#[cfg(feature = "daemon")]
use std::sync::atomic::AtomicBool;

#[cfg(feature = "daemon")]
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::AppHandle;

/// Terminate-on-SIGINT action left by the last dropped guard. signal-hook
/// never reinstalls the default disposition itself, so this stands in for it
/// until the next [`install`].
#[cfg(feature = "daemon")]
static DEFAULT_ACTION: Mutex<Option<signal_hook::SigId>> = parking_lot::const_mutex(None);

/// Keeps the handlers installed. On drop they are unregistered and SIGINT
/// falls back to terminating the process.
pub struct SignalGuard {
    #[cfg(feature = "daemon")]
    ids: Vec<signal_hook::SigId>,
}

impl SignalGuard {
    /// Number of handlers this guard owns.
    #[must_use]
    pub fn installed(&self) -> usize {
        #[cfg(feature = "daemon")]
        {
            self.ids.len()
        }
        #[cfg(not(feature = "daemon"))]
        {
            0
        }
    }
}

/// Install the application's signal handlers.
///
/// Registration failures are logged and skipped; a daemon without a SIGINT
/// handler still shuts down through [`AppHandle::shutdown`].
#[must_use]
pub fn install(handle: &AppHandle) -> SignalGuard {
    ignore_broken_pipe();

    #[cfg(feature = "daemon")]
    {
        let stand_in = DEFAULT_ACTION.lock().take();
        let guard = SignalGuard {
            ids: register_interrupt(handle),
        };
        if let Some(id) = stand_in {
            let _ = signal_hook::low_level::unregister(id);
        }
        debug!(handlers = guard.installed(), "signal handlers installed");
        guard
    }
    #[cfg(not(feature = "daemon"))]
    {
        let _ = handle;
        debug!("built without signal handling; SIGINT keeps its default action");
        SignalGuard {}
    }
}

#[cfg(feature = "daemon")]
fn register_interrupt(handle: &AppHandle) -> Vec<signal_hook::SigId> {
    use signal_hook::consts::SIGINT;
    use signal_hook::flag;

    let interrupted = handle.interrupt_flag();
    let mut ids = Vec::with_capacity(3);

    // Must precede the flag setters: actions run in registration order, so a
    // second SIGINT sees the flag already set and restores the default action.
    let registrations = [
        ("escalation", register_escalation(Arc::clone(&interrupted))),
        ("interrupt", flag::register(SIGINT, interrupted)),
        ("shutdown", flag::register(SIGINT, handle.shutdown_flag())),
    ];
    for (role, registration) in registrations {
        match registration {
            Ok(id) => ids.push(id),
            Err(err) => warn!(role, error = %err, "could not register SIGINT handler"),
        }
    }
    ids
}

/// Terminate on SIGINT once `armed` is set.
#[cfg(feature = "daemon")]
fn register_escalation(armed: Arc<AtomicBool>) -> std::io::Result<signal_hook::SigId> {
    use signal_hook::consts::SIGINT;

    #[cfg(unix)]
    {
        signal_hook::flag::register_conditional_default(SIGINT, armed)
    }
    #[cfg(not(unix))]
    {
        signal_hook::flag::register_conditional_shutdown(SIGINT, 1, armed)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        #[cfg(feature = "daemon")]
        {
            let mut slot = DEFAULT_ACTION.lock();
            if slot.is_none() {
                match register_escalation(Arc::new(AtomicBool::new(true))) {
                    Ok(id) => *slot = Some(id),
                    Err(err) => warn!(error = %err, "could not restore the default SIGINT action"),
                }
            }
            for id in self.ids.drain(..) {
                let _ = signal_hook::low_level::unregister(id);
            }
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn ignore_broken_pipe() {
    use nix::sys::signal::{SigHandler, Signal, signal};

    // SAFETY: SIG_IGN installs no handler code, so nothing runs in signal context.
    if let Err(err) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) } {
        warn!(error = %err, "could not ignore SIGPIPE");
    }
}

#[cfg(not(unix))]
const fn ignore_broken_pipe() {}
