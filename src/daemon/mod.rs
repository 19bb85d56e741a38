//! Daemon kernel: the process-wide application, its event loop, signal
//! handling, and the configuration-driven daemon behind `wkd run`.

pub mod application;
pub mod environment;
pub mod handle;
pub mod kernel;
mod loop_main;
pub mod signals;

pub use application::{Application, ApplicationBuilder, Daemon, EXIT_FAILURE};
pub use handle::{AppHandle, get_instance, shutdown};
pub use kernel::KernelDaemon;

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::{Mutex, MutexGuard};

    static RUNNING: Mutex<()> = parking_lot::const_mutex(());

    /// Serializes tests that run an application: only one may run per process.
    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        RUNNING.lock()
    }
}
