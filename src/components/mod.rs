//! Components compiled into the daemon.

pub mod heartbeat;

use crate::component::StaticLoader;

pub use heartbeat::Heartbeat;

/// Loader that knows every built-in component by name and, when built with
/// native module support, falls back to opening `path` as a shared library.
#[must_use]
pub fn builtin_loader() -> StaticLoader {
    let loader = StaticLoader::new().with_factory(heartbeat::NAME, heartbeat::create);
    #[cfg(feature = "native")]
    let loader = loader.with_fallback(crate::component::NativeLoader::new());
    loader
}
