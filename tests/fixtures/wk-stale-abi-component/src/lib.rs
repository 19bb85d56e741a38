//! Native component module that claims an ABI the kernel does not speak.

use watchkeeper::component::{Component, ComponentConfig};
use watchkeeper::{AppHandle, Result};

pub struct Stale;

impl Component for Stale {
    fn name(&self) -> &str {
        "stale"
    }

    fn set_config(&mut self, _config: ComponentConfig) {}

    fn start(&self, _app: &AppHandle) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[unsafe(no_mangle)]
pub static WK_COMPONENT_ABI_VERSION: u32 = watchkeeper::component::COMPONENT_ABI_VERSION + 1;

#[unsafe(no_mangle)]
pub fn wk_create_component() -> Box<dyn Component> {
    Box::new(Stale)
}
