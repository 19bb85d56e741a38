//! Native component module used by the loader tests.

use std::cell::Cell;

use watchkeeper::component::{Component, ComponentConfig};
use watchkeeper::{AppHandle, Result};

#[derive(Default)]
pub struct Echo {
    started: Cell<bool>,
}

impl Component for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn set_config(&mut self, _config: ComponentConfig) {}

    fn start(&self, _app: &AppHandle) -> Result<()> {
        self.started.set(true);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.started.set(false);
        Ok(())
    }
}

watchkeeper::export_component!(Echo, Echo::default);
