//! Component loaders: native modules and compiled-in factories.
//!
//! [`NativeLoader`] opens a shared library, checks the ABI marker, and calls
//! the exported factory. [`StaticLoader`] resolves bare names against a table
//! of compiled-in factories and can fall back to another loader, which is how
//! targets without dynamic loading (feature `native` off) still satisfy the
//! same load/register/lookup contract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;

use super::Component;
use crate::core::errors::{KernelError, Result};

/// Factory signature exported by component modules and registered with
/// [`StaticLoader`].
pub type ComponentFactory = fn() -> Box<dyn Component>;

/// Process-wide component search path. Entries are never removed.
static SEARCH_DIRS: RwLock<Vec<PathBuf>> = parking_lot::const_rwlock(Vec::new());

/// Append `dir` to the process-wide component search path.
///
/// Returns `false` if the directory was already present.
pub fn add_search_dir(dir: impl Into<PathBuf>) -> bool {
    let dir = dir.into();
    let mut dirs = SEARCH_DIRS.write();
    if dirs.contains(&dir) {
        return false;
    }
    dirs.push(dir);
    true
}

/// Snapshot of the process-wide component search path, in insertion order.
#[must_use]
pub fn search_dirs() -> Vec<PathBuf> {
    SEARCH_DIRS.read().clone()
}

/// What a loader learned about a module without registering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Path as requested.
    pub requested: PathBuf,
    /// Path or built-in name the module was resolved to.
    pub resolved: PathBuf,
    /// Name reported by the component the factory produced.
    pub component: String,
    /// ABI version exported by the module.
    pub abi_version: u32,
}

/// Turns a path into a fresh, unconfigured component.
pub trait ComponentLoader {
    /// Resolve `path` and instantiate the component it provides.
    fn load(&mut self, path: &Path) -> Result<Box<dyn Component>>;

    /// Resolve `path` and report what it provides, without keeping the
    /// instance.
    fn probe(&mut self, path: &Path) -> Result<ModuleInfo>;
}

/// A path with a single normal component, e.g. `heartbeat` or `libping.so`.
fn is_bare_name(path: &Path) -> bool {
    let mut parts = path.components();
    matches!(
        (parts.next(), parts.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

// ──────────────────── compiled-in factories ────────────────────

/// Loader backed by a table of compiled-in factories keyed by bare name.
#[derive(Default)]
pub struct StaticLoader {
    factories: HashMap<String, ComponentFactory>,
    fallback: Option<Box<dyn ComponentLoader>>,
}

impl StaticLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_factory(mut self, name: impl Into<String>, factory: ComponentFactory) -> Self {
        self.register(name, factory);
        self
    }

    /// Paths this loader does not know are handed to `fallback`.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl ComponentLoader + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ComponentFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Registered built-in names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    fn factory_for(&self, path: &Path) -> Option<ComponentFactory> {
        if !is_bare_name(path) {
            return None;
        }
        path.to_str().and_then(|name| self.factories.get(name).copied())
    }

    fn unknown(path: &Path) -> KernelError {
        KernelError::load(path, "no compiled-in component by that name")
    }
}

impl ComponentLoader for StaticLoader {
    fn load(&mut self, path: &Path) -> Result<Box<dyn Component>> {
        if let Some(factory) = self.factory_for(path) {
            return Ok(factory());
        }
        match self.fallback.as_mut() {
            Some(fallback) => fallback.load(path),
            None => Err(Self::unknown(path)),
        }
    }

    fn probe(&mut self, path: &Path) -> Result<ModuleInfo> {
        if let Some(factory) = self.factory_for(path) {
            let component = factory();
            return Ok(ModuleInfo {
                requested: path.to_path_buf(),
                resolved: path.to_path_buf(),
                component: component.name().to_string(),
                abi_version: super::COMPONENT_ABI_VERSION,
            });
        }
        match self.fallback.as_mut() {
            Some(fallback) => fallback.probe(path),
            None => Err(Self::unknown(path)),
        }
    }
}

// ──────────────────── native modules ────────────────────

#[cfg(feature = "native")]
pub use native::NativeLoader;

#[cfg(feature = "native")]
mod native {
    #![allow(unsafe_code)]

    use std::path::{Path, PathBuf};

    use libloading::{Library, Symbol};
    use tracing::{debug, info};

    use super::{ComponentFactory, ComponentLoader, ModuleInfo, is_bare_name, search_dirs};
    use crate::component::{ABI_VERSION_SYMBOL, COMPONENT_ABI_VERSION, Component, FACTORY_SYMBOL};
    use crate::core::errors::{KernelError, Result};

    /// Loader for components shipped as shared libraries.
    ///
    /// Opened modules stay mapped for the rest of the process: components
    /// and their vtables live in module memory and nothing tracks when the
    /// last of them is gone.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativeLoader;

    impl NativeLoader {
        #[must_use]
        pub fn new() -> Self {
            Self
        }

        /// Candidate files for `path`, in the order they are tried.
        ///
        /// Bare names are looked up in every search directory, both verbatim
        /// and with the platform's library prefix/suffix, and finally handed to
        /// the system loader's own search. Anything else is opened as given,
        /// plus the decorated file name when `path` has no extension.
        #[must_use]
        pub fn candidates(path: &Path) -> Vec<PathBuf> {
            let decorated = path
                .file_name()
                .filter(|_| path.extension().is_none())
                .map(|name| PathBuf::from(libloading::library_filename(name)));

            let mut out = Vec::new();
            if is_bare_name(path) {
                for dir in search_dirs() {
                    out.push(dir.join(path));
                    if let Some(decorated) = &decorated {
                        out.push(dir.join(decorated));
                    }
                }
                out.push(path.to_path_buf());
                if let Some(decorated) = decorated {
                    out.push(decorated);
                }
            } else {
                out.push(path.to_path_buf());
                if let Some(decorated) = decorated {
                    out.push(path.with_file_name(decorated));
                }
            }
            out
        }

        fn open(path: &Path) -> Result<(Library, PathBuf)> {
            let mut first_error = None;
            for candidate in Self::candidates(path) {
                // Search-dir candidates that do not exist would only add noise
                // to the diagnostic; the system loader gets the bare name later.
                if candidate.components().count() > 1 && !candidate.exists() && candidate != path {
                    continue;
                }
                debug!(candidate = %candidate.display(), "trying component module");
                // SAFETY: opening a module runs its initialisers. Component
                // modules are trusted code chosen by the daemon's operator.
                match unsafe { Library::new(&candidate) } {
                    Ok(library) => return Ok((library, candidate)),
                    Err(err) => {
                        first_error.get_or_insert(err.to_string());
                    }
                }
            }
            Err(KernelError::load(
                path,
                first_error.unwrap_or_else(|| "module not found in search path".to_string()),
            ))
        }

        fn factory(library: &Library, resolved: &Path) -> Result<(ComponentFactory, u32)> {
            // SAFETY: the symbol type matches what `export_component!` emits.
            let factory: Symbol<'_, ComponentFactory> =
                unsafe { library.get(FACTORY_SYMBOL.as_bytes()) }.map_err(|err| {
                    KernelError::abi(
                        resolved,
                        format!(
                            "module does not export the required factory {FACTORY_SYMBOL}: {err}"
                        ),
                    )
                })?;
            // SAFETY: `export_component!` emits the marker as a `u32` static.
            let version: Symbol<'_, *const u32> =
                unsafe { library.get(ABI_VERSION_SYMBOL.as_bytes()) }.map_err(|err| {
                    KernelError::abi(
                        resolved,
                        format!("module does not export {ABI_VERSION_SYMBOL}: {err}"),
                    )
                })?;
            // SAFETY: the pointer targets a static inside the still-open module.
            let version = unsafe { **version };
            if version != COMPONENT_ABI_VERSION {
                return Err(KernelError::abi(
                    resolved,
                    format!(
                        "module was built for component ABI {version}, \
                         this kernel speaks {COMPONENT_ABI_VERSION}"
                    ),
                ));
            }
            Ok((*factory, version))
        }

        fn instantiate(path: &Path) -> Result<(Box<dyn Component>, PathBuf, u32)> {
            let (library, resolved) = Self::open(path)?;
            let (factory, version) = Self::factory(&library, &resolved)?;
            let component = factory();
            // Keep the module mapped for the process lifetime.
            std::mem::forget(library);
            Ok((component, resolved, version))
        }
    }

    impl ComponentLoader for NativeLoader {
        fn load(&mut self, path: &Path) -> Result<Box<dyn Component>> {
            let (component, resolved, _) = Self::instantiate(path)?;
            info!(
                module = %resolved.display(),
                component = component.name(),
                "component module loaded"
            );
            Ok(component)
        }

        fn probe(&mut self, path: &Path) -> Result<ModuleInfo> {
            let (component, resolved, abi_version) = Self::instantiate(path)?;
            Ok(ModuleInfo {
                requested: path.to_path_buf(),
                resolved,
                component: component.name().to_string(),
                abi_version,
            })
        }
    }
}
