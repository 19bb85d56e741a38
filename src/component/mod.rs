//! Component interface, opaque component configuration, and the plugin ABI.
//!
//! A component is a pluggable unit of daemon functionality (a checker, a
//! notifier, an exporter). The kernel only knows it through [`Component`]:
//! it has a unique name, receives its configuration before it is started,
//! and is started when registered and stopped when unregistered or at
//! application teardown. A stopped component is never restarted.
//!
//! Components shipped as native modules export a factory under
//! [`FACTORY_SYMBOL`] and an ABI marker under [`ABI_VERSION_SYMBOL`]; use
//! [`export_component!`](crate::export_component) to generate both.

pub mod loader;
pub mod registry;

use serde::de::DeserializeOwned;

use crate::core::errors::{KernelError, Result};
use crate::daemon::AppHandle;

pub use loader::{ComponentFactory, ComponentLoader, StaticLoader, search_dirs};
#[cfg(feature = "native")]
pub use loader::NativeLoader;
pub use registry::ComponentRegistry;

/// Name of the factory entry point every component module must export.
pub const FACTORY_SYMBOL: &str = "wk_create_component";

/// Name of the ABI marker every component module must export.
pub const ABI_VERSION_SYMBOL: &str = "WK_COMPONENT_ABI_VERSION";

/// Version of the component ABI understood by this kernel.
///
/// Bumped whenever [`Component`] or [`ComponentConfig`] change shape.
pub const COMPONENT_ABI_VERSION: u32 = 1;

/// The capability set every component satisfies.
///
/// `start` and `stop` take `&self`: the registry hands out shared handles, so
/// components keep mutable state behind `Cell`/`RefCell` or atomics.
pub trait Component {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// Receive configuration. Called once, before the component is started.
    fn set_config(&mut self, config: ComponentConfig);

    /// Bring the component online. Called on the main thread.
    fn start(&self, app: &AppHandle) -> Result<()>;

    /// Take the component offline. Called on the main thread, possibly on a
    /// component that was never started or already stopped.
    fn stop(&self) -> Result<()>;
}

/// Opaque per-component settings, taken verbatim from the `[components.config]`
/// table of the daemon configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig {
    table: toml::Table,
}

impl ComponentConfig {
    #[must_use]
    pub fn new(table: toml::Table) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.table.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Decode the whole table into a component-specific settings type.
    pub fn decode<T: DeserializeOwned>(&self, component: &str) -> Result<T> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .map_err(|err: toml::de::Error| {
                KernelError::component(component, format!("invalid configuration: {err}"))
            })
    }
}

impl From<toml::Table> for ComponentConfig {
    fn from(table: toml::Table) -> Self {
        Self::new(table)
    }
}

/// Export a component type from a `cdylib`/`dylib` crate.
///
/// ```ignore
/// watchkeeper::export_component!(PingChecker, PingChecker::default);
/// ```
///
/// The module and the daemon must be built with the same compiler and the
/// same version of this crate: the factory uses the Rust ABI.
#[macro_export]
macro_rules! export_component {
    ($ty:ty, $ctor:expr) => {
        #[allow(unsafe_code)]
        #[unsafe(no_mangle)]
        pub static WK_COMPONENT_ABI_VERSION: u32 = $crate::component::COMPONENT_ABI_VERSION;

        #[allow(unsafe_code)]
        #[unsafe(no_mangle)]
        pub fn wk_create_component() -> ::std::boxed::Box<dyn $crate::component::Component> {
            let constructor: fn() -> $ty = $ctor;
            ::std::boxed::Box::new(constructor())
        }
    };
}

#[cfg(test)]
mod tests {
    use super::ComponentConfig;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Settings {
        interval_secs: u64,
        #[serde(default)]
        label: Option<String>,
    }

    #[test]
    fn decode_reads_typed_settings() {
        let table: toml::Table = toml::from_str("interval_secs = 7\nlabel = \"edge\"").unwrap();
        let config = ComponentConfig::from(table);
        let settings: Settings = config.decode("checker").unwrap();
        assert_eq!(
            settings,
            Settings {
                interval_secs: 7,
                label: Some("edge".to_string()),
            }
        );
    }

    #[test]
    fn decode_failure_names_component() {
        let table: toml::Table = toml::from_str("interval_secs = \"soon\"").unwrap();
        let err = ComponentConfig::from(table)
            .decode::<Settings>("checker")
            .unwrap_err();
        assert_eq!(err.code(), "WK-2003");
        assert!(err.to_string().contains("'checker'"));
    }
}
