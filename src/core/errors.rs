//! WK-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Top-level error type for the watchkeeper kernel.
///
/// Programming errors (running two applications at once, mutating the
/// component registry off the main thread) are not represented here: they
/// panic through assertions instead of being returned.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("[WK-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[WK-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[WK-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[WK-2001] could not load module '{path}': {details}")]
    Load { path: PathBuf, details: String },

    #[error("[WK-2002] loadable module '{path}' is not a component: {details}")]
    Abi { path: PathBuf, details: String },

    #[error("[WK-2003] component '{name}' failed: {details}")]
    Component { name: String, details: String },

    #[error("[WK-3001] {context} failed: {source}")]
    Os {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[WK-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl KernelError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "WK-1001",
            Self::MissingConfig { .. } => "WK-1002",
            Self::ConfigParse { .. } => "WK-1003",
            Self::Load { .. } => "WK-2001",
            Self::Abi { .. } => "WK-2002",
            Self::Component { .. } => "WK-2003",
            Self::Os { .. } => "WK-3001",
            Self::Runtime { .. } => "WK-3900",
        }
    }

    /// Error category, as reported by the top-level safety net in `run`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } | Self::MissingConfig { .. } | Self::ConfigParse { .. } => {
                "ConfigError"
            }
            Self::Load { .. } => "LoadError",
            Self::Abi { .. } => "AbiError",
            Self::Component { .. } => "ComponentError",
            Self::Os { .. } => "OsError",
            Self::Runtime { .. } => "RuntimeError",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Os { .. } | Self::Runtime { .. })
    }

    /// Originating OS error code, when the failure wraps one.
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Convenience constructor for wrapped platform errors.
    #[must_use]
    pub fn os(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Os {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn load(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Load {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }

    #[must_use]
    pub fn abi(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Abi {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }

    #[must_use]
    pub fn component(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Component {
            name: name.into(),
            details: details.into(),
        }
    }

    #[must_use]
    pub fn runtime(details: impl Into<String>) -> Self {
        Self::Runtime {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigParse {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for KernelError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
