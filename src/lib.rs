//! watchkeeper: the process-lifecycle kernel of a monitoring daemon.
//!
//! A daemon built on this crate creates one [`Application`](daemon::Application),
//! hands it a [`Daemon`](daemon::Daemon) entry point, and lets
//! [`Application::run`](daemon::Application::run) drive it: components are
//! loaded by name or from native modules, started on registration, served by
//! a cooperative event loop of timers and events, and stopped when the
//! application is torn down. SIGINT requests a graceful shutdown; a second
//! SIGINT terminates immediately.
//!
//! Modules:
//! - [`core`]: configuration and the error taxonomy.
//! - [`component`]: the component interface, registry, and loaders.
//! - [`runtime`]: timer and event sources behind the event loop.
//! - [`daemon`]: the application singleton, event loop, and signal wiring.
//! - [`components`]: components compiled into the daemon.
//! - [`logger`]: `tracing` subscriber setup.

pub mod component;
pub mod components;
pub mod core;
pub mod daemon;
pub mod logger;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli_app;

pub use core::errors::{KernelError, Result};
pub use daemon::{AppHandle, Application, Daemon, get_instance};
