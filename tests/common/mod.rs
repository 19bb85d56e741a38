//! Shared harness: runs the built `wkd` binary and keeps a log per case.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

pub fn wkd_binary() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_wkd"))
}

fn log_dir() -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("wkd-cli-cases");
    std::fs::create_dir_all(&dir).expect("create case log dir");
    dir
}

/// Write a per-case log with the command line and both output streams.
pub fn record(case_name: &str, args: &[&str], output: &Output) -> CmdResult {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let mut log = String::new();
    let _ = writeln!(log, "$ wkd {}", args.join(" "));
    let _ = writeln!(log, "status: {:?}", output.status);
    let _ = writeln!(log, "--- stdout ---\n{stdout}");
    let _ = writeln!(log, "--- stderr ---\n{stderr}");
    let log_path = log_dir().join(format!("{case_name}.log"));
    std::fs::write(&log_path, log).expect("write case log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

pub fn run_cli_case_with_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let mut command = Command::new(wkd_binary());
    command.args(args).env_remove("RUST_LOG").env_remove("_DEBUG");
    for key in ["WK_LOG_LEVEL", "WK_LOG_FORMAT", "WK_COMPONENT_DIRS"] {
        command.env_remove(key);
    }
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("spawn wkd");
    record(case_name, args, &output)
}
