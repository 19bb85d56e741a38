//! The application object: lifecycle, component registry, and `run`.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::environment;
use super::handle::{AppHandle, InstanceGuard};
use super::signals;
use crate::component::loader::{self, ModuleInfo};
use crate::component::{Component, ComponentConfig, ComponentLoader, ComponentRegistry};
use crate::core::errors::{KernelError, Result};
use crate::runtime::timers::DEFAULT_MAX_WAIT;
use crate::runtime::{EventQueue, EventSource, TimerQueue, TimerSource};

/// Process exit status reported when `Daemon::main` fails.
pub const EXIT_FAILURE: i32 = 1;

/// The program-specific entry point run inside [`Application::run`].
pub trait Daemon {
    /// Set up components, usually enter [`Application::run_event_loop`], and
    /// return the process exit status.
    fn main(&mut self, app: &mut Application, args: &[String]) -> Result<i32>;
}

impl<F> Daemon for F
where
    F: FnMut(&mut Application, &[String]) -> Result<i32>,
{
    fn main(&mut self, app: &mut Application, args: &[String]) -> Result<i32> {
        self(app, args)
    }
}

/// Configures an [`Application`] before it exists.
#[must_use]
pub struct ApplicationBuilder {
    debugging: Option<bool>,
    max_wait: Duration,
    loader: Option<Box<dyn ComponentLoader>>,
    timer_source: Option<Box<dyn TimerSource>>,
    event_source: Option<Box<dyn EventSource>>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self {
            debugging: None,
            max_wait: DEFAULT_MAX_WAIT,
            loader: None,
            timer_source: None,
            event_source: None,
        }
    }
}

impl ApplicationBuilder {
    /// Force debugging mode on or off instead of probing the environment.
    pub fn debugging(mut self, debugging: bool) -> Self {
        self.debugging = Some(debugging);
        self
    }

    /// Upper bound on a single event wait; the loop notices shutdown requests
    /// at least this often.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Loader used by [`Application::load_component`].
    pub fn loader(mut self, loader: impl ComponentLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Replace the default [`TimerQueue`]. Timers scheduled through
    /// [`AppHandle::timers`] then never fire.
    pub fn timer_source(mut self, source: impl TimerSource + 'static) -> Self {
        self.timer_source = Some(Box::new(source));
        self
    }

    /// Replace the default [`EventQueue`]. Events posted through
    /// [`AppHandle::events`] then are never delivered.
    pub fn event_source(mut self, source: impl EventSource + 'static) -> Self {
        self.event_source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn build(self) -> Application {
        let debugging = self.debugging.unwrap_or_else(environment::debugging_requested);
        let timers = TimerQueue::new().with_max_wait(self.max_wait);
        let events = EventQueue::new();
        let handle = AppHandle::new(debugging, timers.clone(), events.sender());

        Application {
            handle,
            registry: ComponentRegistry::new(),
            loader: self
                .loader
                .unwrap_or_else(|| Box::new(crate::components::builtin_loader())),
            timer_source: self.timer_source.unwrap_or_else(|| Box::new(timers)),
            event_source: self.event_source.unwrap_or_else(|| Box::new(events)),
            exe_path: OnceCell::new(),
        }
    }
}

/// The daemon's process-wide application.
///
/// At most one application runs per process; while it runs it is reachable
/// through [`get_instance`](super::get_instance). The application owns every
/// registered component and stops them all when it is dropped.
///
/// `Application` is neither `Send` nor `Sync`: it is created, run, and
/// dropped on one thread, the main thread. Other threads interact with it
/// only through an [`AppHandle`].
pub struct Application {
    pub(super) handle: AppHandle,
    registry: ComponentRegistry,
    loader: Box<dyn ComponentLoader>,
    pub(super) timer_source: Box<dyn TimerSource>,
    pub(super) event_source: Box<dyn EventSource>,
    exe_path: OnceCell<PathBuf>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    /// Run `daemon` as this process's application and return its exit status.
    ///
    /// Installs the process instance and signal handlers, records the calling
    /// thread as the main thread, and calls [`Daemon::main`]. In debugging
    /// mode an error from `main` is raised as a panic so a debugger stops at
    /// it; otherwise it is logged as critical and [`EXIT_FAILURE`] is
    /// returned. The process instance is released on every path out.
    ///
    /// # Panics
    ///
    /// If another application is running in this process, or this one has
    /// run before.
    pub fn run<D, I, S>(&mut self, daemon: &mut D, args: I) -> i32
    where
        D: Daemon + ?Sized,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let instance = InstanceGuard::install(&self.handle);
        self.handle.mark_main_thread();
        let signals = signals::install(&self.handle);

        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.handle.set_arguments(args.clone());
        info!(
            pid = std::process::id(),
            debugging = self.handle.is_debugging(),
            "application starting"
        );

        let outcome = daemon.main(self, &args);

        drop(signals);
        drop(instance);

        match outcome {
            Ok(status) => {
                debug!(status, "application main returned");
                status
            }
            Err(err) if self.handle.is_debugging() => {
                panic!("{} escaped Daemon::main: {err}", err.kind());
            }
            Err(err) => {
                error!(
                    severity = "critical",
                    category = "Application",
                    kind = err.kind(),
                    code = err.code(),
                    "Error in Daemon::main: {err}"
                );
                EXIT_FAILURE
            }
        }
    }

    /// Cheap shareable view of this application.
    #[must_use]
    pub fn handle(&self) -> &AppHandle {
        &self.handle
    }

    /// Request shutdown; the event loop exits before its next wait.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.handle.is_shutting_down()
    }

    #[must_use]
    pub fn is_debugging(&self) -> bool {
        self.handle.is_debugging()
    }

    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        self.handle.is_main_thread()
    }

    /// Arguments passed to `run`, argv[0] first. Empty before `run`.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        self.handle.arguments()
    }

    /// Canonical path of the running executable, resolved from argv[0] on
    /// first use and cached.
    pub fn exe_path(&self) -> Result<&Path> {
        if let Some(path) = self.exe_path.get() {
            return Ok(path.as_path());
        }
        let argv0 = self.arguments().first().ok_or_else(|| {
            KernelError::runtime("executable path requested before Application::run")
        })?;
        let resolved = environment::resolve_exe_path(argv0)?;
        Ok(self.exe_path.get_or_init(|| resolved).as_path())
    }

    /// Load the component at `path`, hand it `config`, register it, and
    /// start it.
    ///
    /// # Panics
    ///
    /// If called off the main thread.
    pub fn load_component(
        &mut self,
        path: &Path,
        config: ComponentConfig,
    ) -> Result<Rc<dyn Component>> {
        self.assert_main_thread("load_component");
        info!(path = %path.display(), "loading component");

        let mut component = self.loader.load(path)?;
        component.set_config(config);
        let component: Rc<dyn Component> = Rc::from(component);
        self.register_component(Rc::clone(&component))?;
        Ok(component)
    }

    /// Resolve `path` through the loader without registering anything.
    pub fn probe_component(&mut self, path: &Path) -> Result<ModuleInfo> {
        self.loader.probe(path)
    }

    /// Register `component` under its name and start it.
    ///
    /// A component already registered under the same name is replaced
    /// without being stopped. If `start` fails the component stays
    /// registered and the error is returned.
    ///
    /// # Panics
    ///
    /// If called off the main thread.
    pub fn register_component(&mut self, component: Rc<dyn Component>) -> Result<()> {
        self.assert_main_thread("register_component");
        self.registry.register(component, &self.handle)
    }

    /// Remove `component` if it is registered, then stop it either way.
    ///
    /// # Panics
    ///
    /// If called off the main thread.
    pub fn unregister_component(&mut self, component: &Rc<dyn Component>) -> Result<()> {
        self.assert_main_thread("unregister_component");
        self.registry.unregister(component)
    }

    #[must_use]
    pub fn get_component(&self, name: &str) -> Option<Rc<dyn Component>> {
        self.registry.get(name)
    }

    /// Names of all registered components, sorted.
    #[must_use]
    pub fn component_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Append `dir` to the process-wide module search path.
    pub fn add_component_search_dir(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if loader::add_search_dir(dir.clone()) {
            debug!(dir = %dir.display(), "component search directory added");
        }
    }

    pub(super) fn assert_main_thread(&self, operation: &str) {
        assert!(
            self.handle.is_main_thread(),
            "Application::{operation} must be called on the main thread"
        );
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.handle.shutdown();
        if self.registry.is_empty() {
            return;
        }
        debug!(components = self.registry.len(), "stopping components");
        for err in self.registry.stop_all() {
            warn!(code = err.code(), "component failed to stop during teardown: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::rc::Rc;
    use std::time::Duration;

    use super::{Application, EXIT_FAILURE};
    use crate::component::registry::tests::Probe;
    use crate::component::{Component, ComponentConfig, StaticLoader};
    use crate::core::errors::{KernelError, Result};
    use crate::daemon::{get_instance, test_support::serial};

    fn quiet_app() -> Application {
        Application::builder()
            .debugging(false)
            .max_wait(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn run_returns_main_status_and_releases_instance() {
        let _serial = serial();
        let mut app = quiet_app();
        let status = app.run(
            &mut |app: &mut Application, args: &[String]| -> Result<i32> {
                assert!(app.is_main_thread());
                assert_eq!(args, ["wkd", "--flag"]);
                let live = get_instance().expect("instance during run");
                assert!(live.same_app(app.handle()));
                Ok(7)
            },
            ["wkd", "--flag"],
        );
        assert_eq!(status, 7);
        assert!(get_instance().is_none());
        assert_eq!(app.arguments(), ["wkd", "--flag"]);
    }

    #[test]
    fn error_from_main_is_exit_failure_when_not_debugging() {
        let _serial = serial();
        let mut app = quiet_app();
        let status = app.run(
            &mut |_: &mut Application, _: &[String]| -> Result<i32> {
                Err(KernelError::runtime("main failed"))
            },
            ["wkd"],
        );
        assert_eq!(status, EXIT_FAILURE);
        assert!(get_instance().is_none());
    }

    #[test]
    fn error_from_main_panics_when_debugging_and_still_releases_instance() {
        let _serial = serial();
        let mut app = Application::builder().debugging(true).build();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            app.run(
                &mut |_: &mut Application, _: &[String]| -> Result<i32> {
                    Err(KernelError::runtime("main failed"))
                },
                ["wkd"],
            )
        }));
        assert!(outcome.is_err());
        assert!(get_instance().is_none());
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn nested_run_is_an_invariant_violation() {
        let _serial = serial();
        let mut outer = quiet_app();
        outer.run(
            &mut |_: &mut Application, _: &[String]| -> Result<i32> {
                let mut inner = Application::builder().debugging(false).build();
                Ok(inner.run(
                    &mut |_: &mut Application, _: &[String]| -> Result<i32> { Ok(0) },
                    ["inner"],
                ))
            },
            ["outer"],
        );
    }

    #[test]
    #[should_panic(expected = "main thread")]
    fn register_before_run_panics() {
        let mut app = quiet_app();
        let _ = app.register_component(Rc::new(Probe::named("early")));
    }

    #[test]
    fn components_are_loaded_configured_and_stopped_on_drop() {
        let _serial = serial();
        let probe: Rc<dyn Component>;
        {
            fn probe_factory() -> Box<dyn Component> {
                Box::new(Probe::named("probe"))
            }
            let loader = StaticLoader::new().with_factory("probe", probe_factory);
            let mut app = Application::builder()
                .debugging(false)
                .loader(loader)
                .build();
            let mut loaded = None;
            let status = app.run(
                &mut |app: &mut Application, _: &[String]| -> Result<i32> {
                    let mut table = toml::Table::new();
                    table.insert("interval".into(), toml::Value::Integer(5));
                    let component =
                        app.load_component(Path::new("probe"), ComponentConfig::new(table))?;
                    loaded = Some(component);
                    Ok(0)
                },
                ["wkd"],
            );
            assert_eq!(status, 0);
            assert_eq!(app.component_names(), ["probe"]);
            probe = loaded.expect("loaded");
            assert!(Rc::ptr_eq(&probe, &app.get_component("probe").expect("registered")));
        }
        assert_eq!(Rc::strong_count(&probe), 1, "application released its reference");
    }

    #[test]
    fn unknown_component_fails_main() {
        let _serial = serial();
        let mut app = Application::builder()
            .debugging(false)
            .loader(StaticLoader::new())
            .build();
        let status = app.run(
            &mut |app: &mut Application, _: &[String]| -> Result<i32> {
                app.load_component(Path::new("nothing"), ComponentConfig::default())?;
                Ok(0)
            },
            ["wkd"],
        );
        assert_eq!(status, EXIT_FAILURE);
        assert!(app.component_names().is_empty());
    }

    #[test]
    fn exe_path_requires_arguments() {
        let app = quiet_app();
        assert!(app.exe_path().is_err());
    }
}
