//! Facts about the hosting process: debugger detection and executable path.

#[cfg(unix)]
use std::ffi::OsStr;
#[cfg(unix)]
use std::path::Path;
use std::path::PathBuf;

use crate::core::errors::{KernelError, Result};

/// Environment variable that forces debugging mode when it starts with a
/// non-zero integer.
pub const DEBUG_ENV: &str = "_DEBUG";

/// Whether a new application should run in debugging mode.
#[must_use]
pub fn debugging_requested() -> bool {
    debug_flag(std::env::var(DEBUG_ENV).ok().as_deref()) || debugger_attached()
}

/// Interpret a `_DEBUG` value: its leading integer, non-zero means on.
/// Unset, empty, and non-numeric values are off.
#[must_use]
pub fn debug_flag(raw: Option<&str>) -> bool {
    raw.is_some_and(|value| leading_integer(value) != 0)
}

/// Parse an optionally signed decimal prefix after leading whitespace, the
/// way C's `strtol` does. Saturates instead of overflowing.
fn leading_integer(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0_i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
        });
    if negative { -magnitude } else { magnitude }
}

/// True if a tracer (debugger) is attached to this process.
#[cfg(target_os = "linux")]
#[must_use]
pub fn debugger_attached() -> bool {
    std::fs::read_to_string("/proc/self/status").is_ok_and(|status| tracer_pid(&status) != 0)
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub const fn debugger_attached() -> bool {
    false
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tracer_pid(status: &str) -> u32 {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Resolve the absolute, canonical path of the running executable from
/// `argv0`.
///
/// A relative `argv0` is taken against the working directory. A bare name is
/// looked up on `PATH` first; if `PATH` is set but holds no executable by that
/// name, resolution fails.
#[cfg(unix)]
pub fn resolve_exe_path(argv0: &str) -> Result<PathBuf> {
    let cwd = std::env::current_dir().map_err(|err| KernelError::os("getcwd", err))?;
    let path_var = std::env::var_os("PATH");
    resolve_exe_path_in(argv0, &cwd, path_var.as_deref())
}

/// Resolve the canonical path of the running executable.
///
/// `argv0` is ignored: the OS reports the module path directly.
#[cfg(not(unix))]
pub fn resolve_exe_path(_argv0: &str) -> Result<PathBuf> {
    std::env::current_exe().map_err(|err| KernelError::os("current_exe", err))
}

#[cfg(unix)]
fn resolve_exe_path_in(argv0: &str, cwd: &Path, path_var: Option<&OsStr>) -> Result<PathBuf> {
    if argv0.is_empty() {
        return Err(KernelError::runtime("cannot resolve executable path: argv[0] is empty"));
    }

    let mut candidate = if Path::new(argv0).is_absolute() {
        PathBuf::from(argv0)
    } else {
        cwd.join(argv0)
    };

    if !argv0.contains('/')
        && let Some(path_var) = path_var
    {
        candidate = std::env::split_paths(path_var)
            .map(|dir| dir.join(argv0))
            .find(|path| is_executable(path))
            .ok_or_else(|| {
                KernelError::runtime(format!(
                    "could not determine executable path: '{argv0}' not found on PATH"
                ))
            })?;
    }

    std::fs::canonicalize(&candidate)
        .map_err(|err| KernelError::os(format!("realpath({})", candidate.display()), err))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};

    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}
