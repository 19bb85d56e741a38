//! The configuration-driven daemon run by `wkd run`.

use tracing::{info, warn};

use super::{Application, Daemon};
use crate::core::config::Config;
use crate::core::errors::Result;

/// Loads the configured components, runs the event loop, and exits cleanly
/// on shutdown.
#[derive(Debug, Clone)]
pub struct KernelDaemon {
    config: Config,
}

impl KernelDaemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn load_components(&self, app: &mut Application) -> Result<()> {
        for dir in &self.config.daemon.component_dirs {
            app.add_component_search_dir(dir.clone());
        }

        for entry in &self.config.components {
            match app.load_component(&entry.path, entry.component_config()) {
                Ok(component) => {
                    info!(
                        component = component.name(),
                        path = %entry.path.display(),
                        "component started"
                    );
                }
                Err(err) if entry.optional => {
                    warn!(
                        path = %entry.path.display(),
                        code = err.code(),
                        "skipping optional component: {err}"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

impl Daemon for KernelDaemon {
    fn main(&mut self, app: &mut Application, _args: &[String]) -> Result<i32> {
        self.load_components(app)?;
        info!(
            components = app.component_names().len(),
            "watchkeeper running; send SIGINT to stop"
        );
        app.run_event_loop();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::KernelDaemon;
    use crate::core::config::Config;
    use crate::daemon::test_support::serial;
    use crate::daemon::{Application, EXIT_FAILURE};

    fn app() -> Application {
        Application::builder()
            .debugging(false)
            .max_wait(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn missing_required_component_fails_the_run() {
        let _serial = serial();
        let config = Config::from_toml_str(
            r#"
            [[components]]
            path = "no-such-component"
            "#,
        )
        .expect("config");
        let status = app().run(&mut KernelDaemon::new(config), ["wkd"]);
        assert_eq!(status, EXIT_FAILURE);
    }

    #[test]
    fn out_of_range_heartbeat_interval_fails_the_run() {
        let _serial = serial();
        let config = Config::from_toml_str(
            r#"
            [[components]]
            path = "heartbeat"
            config = { interval_secs = 9223372036854775807 }
            "#,
        )
        .expect("config");
        let status = app().run(&mut KernelDaemon::new(config), ["wkd"]);
        assert_eq!(status, EXIT_FAILURE);
    }

    #[test]
    fn optional_components_are_skipped_and_builtins_start() {
        let _serial = serial();
        let config = Config::from_toml_str(
            r#"
            [[components]]
            path = "no-such-component"
            optional = true

            [[components]]
            path = "heartbeat"
            config = { interval_secs = 60 }
            "#,
        )
        .expect("config");

        let mut app = app();
        let handle = app.handle().clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            handle.shutdown();
        });
        let status = app.run(&mut KernelDaemon::new(config), ["wkd"]);
        assert_eq!(status, 0);
        assert_eq!(app.component_names(), ["heartbeat"]);
    }
}
