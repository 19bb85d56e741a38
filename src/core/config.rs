//! Daemon configuration: TOML file, defaults, and `WK_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::component::ComponentConfig;
use crate::core::errors::{KernelError, Result};

/// Location consulted when no explicit config path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/watchkeeper/watchkeeper.toml";

/// Full daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Event loop and component search settings.
    pub daemon: DaemonConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
    /// Components loaded by the daemon at startup, in order.
    pub components: Vec<ComponentEntry>,
}

/// `[daemon]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Upper bound on a single event wait, in milliseconds.
    pub max_wait_ms: u64,
    /// Directories appended to the component search path.
    pub component_dirs: Vec<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 500,
            component_dirs: Vec::new(),
        }
    }
}

impl DaemonConfig {
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `watchkeeper=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(KernelError::InvalidConfig {
                details: format!("unknown log format '{other}' (expected 'text' or 'json')"),
            }),
        }
    }
}

/// One `[[components]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentEntry {
    /// Module path, bare module name, or built-in component name.
    pub path: PathBuf,
    /// When set, a load failure is logged and skipped instead of aborting startup.
    #[serde(default)]
    pub optional: bool,
    /// Opaque settings handed to the component before it starts.
    #[serde(default)]
    pub config: toml::Table,
}

impl ComponentEntry {
    #[must_use]
    pub fn component_config(&self) -> ComponentConfig {
        ComponentConfig::new(self.config.clone())
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
    /// used when present and defaults otherwise. Environment overrides are
    /// applied last, then the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without applying overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KernelError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|err| KernelError::os(format!("reading {}", path.display()), err))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `WK_LOG_LEVEL`, `WK_LOG_FORMAT` and `WK_COMPONENT_DIRS`.
    ///
    /// `lookup` abstracts the environment so tests do not mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("WK_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }
        if let Some(format) = lookup("WK_LOG_FORMAT").filter(|v| !v.trim().is_empty()) {
            self.logging.format = LogFormat::parse(&format)?;
        }
        if let Some(dirs) = lookup("WK_COMPONENT_DIRS") {
            self.daemon
                .component_dirs
                .extend(std::env::split_paths(&dirs).filter(|p| !p.as_os_str().is_empty()));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemon.max_wait_ms == 0 {
            return Err(KernelError::InvalidConfig {
                details: "daemon.max_wait_ms must be greater than zero".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(KernelError::InvalidConfig {
                details: "logging.level must not be empty".to_string(),
            });
        }
        if let Some(index) = self
            .components
            .iter()
            .position(|entry| entry.path.as_os_str().is_empty())
        {
            return Err(KernelError::InvalidConfig {
                details: format!("components[{index}].path must not be empty"),
            });
        }
        Ok(())
    }
}
