//! Live set of named components.
//!
//! The registry does no locking and no thread checks of its own; the
//! [`Application`](crate::daemon::Application) that owns it asserts main-thread
//! affinity before every mutation.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use super::Component;
use crate::core::errors::{KernelError, Result};
use crate::daemon::AppHandle;

/// Registry of started components keyed by [`Component::name`].
#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Rc<dyn Component>>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) the entry for `component`, then start it.
    ///
    /// A previous component under the same name is dropped from the map
    /// without being stopped; callers that want replacement semantics
    /// unregister the old one first.
    pub fn register(&mut self, component: Rc<dyn Component>, app: &AppHandle) -> Result<()> {
        let name = component.name().to_string();
        if self.components.insert(name.clone(), Rc::clone(&component)).is_some() {
            warn!(component = %name, "overwrote a registered component without stopping it");
        }
        debug!(component = %name, "starting component");
        component.start(app)
    }

    /// Remove the entry named like `component` (if any), then stop `component`.
    ///
    /// `stop` is called on the argument whether or not it was registered.
    pub fn unregister(&mut self, component: &Rc<dyn Component>) -> Result<()> {
        let name = component.name();
        if self.components.remove(name).is_none() {
            debug!(component = %name, "stopping a component that was not registered");
        }
        component.stop()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<dyn Component>> {
        self.components.get(name).cloned()
    }

    /// Registered names, sorted for stable output.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Stop every registered component, then clear the map.
    ///
    /// A failing `stop` is logged and returned, and the remaining components
    /// are still stopped.
    pub fn stop_all(&mut self) -> Vec<KernelError> {
        let mut failures = Vec::new();
        for (name, component) in &self.components {
            if let Err(err) = component.stop() {
                warn!(component = %name, error = %err, "component failed to stop");
                failures.push(err);
            }
        }
        self.components.clear();
        failures
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::ComponentRegistry;
    use crate::component::{Component, ComponentConfig};
    use crate::core::errors::{KernelError, Result};
    use crate::daemon::AppHandle;

    /// Component that counts lifecycle calls.
    #[derive(Default)]
    pub(crate) struct Probe {
        pub name: String,
        pub starts: Cell<u32>,
        pub stops: Cell<u32>,
        pub fail_stop: bool,
        pub config: RefCell<Option<ComponentConfig>>,
    }

    impl Probe {
        pub(crate) fn named(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ..Self::default()
            }
        }
    }

    impl Component for Probe {
        fn name(&self) -> &str {
            &self.name
        }
        fn set_config(&mut self, config: ComponentConfig) {
            *self.config.get_mut() = Some(config);
        }
        fn start(&self, _app: &AppHandle) -> Result<()> {
            self.starts.set(self.starts.get() + 1);
            Ok(())
        }
        fn stop(&self) -> Result<()> {
            self.stops.set(self.stops.get() + 1);
            if self.fail_stop {
                return Err(KernelError::component(&self.name, "refused to stop"));
            }
            Ok(())
        }
    }

    fn as_component(probe: &Rc<Probe>) -> Rc<dyn Component> {
        Rc::clone(probe) as Rc<dyn Component>
    }

    #[test]
    fn register_starts_once_and_is_retrievable() {
        let app = AppHandle::detached();
        let mut registry = ComponentRegistry::new();
        let probe = Rc::new(Probe::named("x"));

        registry.register(as_component(&probe), &app).unwrap();

        let found = registry.get("x").expect("registered");
        assert!(Rc::ptr_eq(&found, &as_component(&probe)));
        assert_eq!(probe.starts.get(), 1);
        assert_eq!(probe.stops.get(), 0);
    }

    #[test]
    fn unregister_removes_and_stops_once() {
        let app = AppHandle::detached();
        let mut registry = ComponentRegistry::new();
        let probe = Rc::new(Probe::named("x"));
        registry.register(as_component(&probe), &app).unwrap();

        registry.unregister(&as_component(&probe)).unwrap();

        assert!(registry.get("x").is_none());
        assert_eq!(probe.stops.get(), 1);
    }

    #[test]
    fn unregister_stops_component_that_was_never_registered() {
        let mut registry = ComponentRegistry::new();
        let probe = Rc::new(Probe::named("ghost"));

        registry.unregister(&as_component(&probe)).unwrap();

        assert_eq!(probe.stops.get(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_name_overwrites_without_stopping_first() {
        let app = AppHandle::detached();
        let mut registry = ComponentRegistry::new();
        let first = Rc::new(Probe::named("x"));
        let second = Rc::new(Probe::named("x"));

        registry.register(as_component(&first), &app).unwrap();
        registry.register(as_component(&second), &app).unwrap();

        let found = registry.get("x").unwrap();
        assert!(Rc::ptr_eq(&found, &as_component(&second)));
        assert_eq!(first.stops.get(), 0, "first occupant must not be stopped");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stop_all_isolates_failures() {
        let app = AppHandle::detached();
        let mut registry = ComponentRegistry::new();
        let bad = Rc::new(Probe {
            fail_stop: true,
            ..Probe::named("bad")
        });
        let good_a = Rc::new(Probe::named("a"));
        let good_b = Rc::new(Probe::named("b"));
        for probe in [&bad, &good_a, &good_b] {
            registry.register(as_component(probe), &app).unwrap();
        }

        let failures = registry.stop_all();

        assert_eq!(failures.len(), 1);
        assert_eq!(bad.stops.get(), 1);
        assert_eq!(good_a.stops.get(), 1);
        assert_eq!(good_b.stops.get(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let app = AppHandle::detached();
        let mut registry = ComponentRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(Rc::new(Probe::named(name)), &app)
                .unwrap();
        }
        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
    }
}
