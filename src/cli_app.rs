//! Top-level CLI definition and dispatch.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::json;

use crate::component::ComponentLoader;
use crate::components::builtin_loader;
use crate::core::config::Config;
use crate::core::errors::{KernelError, Result};
use crate::daemon::{Application, KernelDaemon};
use crate::logger;

/// Watchkeeper daemon: runs monitoring components under a single event loop.
#[derive(Parser)]
#[command(name = "wkd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground until interrupted.
    Run {
        /// Configuration file (default: /etc/watchkeeper/watchkeeper.toml if present).
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration after environment overrides.
    Config {
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Print JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
    /// Check that a component module loads, without starting it.
    Probe {
        /// Built-in component name, module name, or module path.
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Dispatch CLI commands and return the process exit status.
///
/// # Errors
/// Configuration and output failures. Failures inside a running daemon are
/// reported by the daemon itself and only affect the status.
pub fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Command::Run { config } => run_daemon(config.as_deref()),
        Command::Config { config, json } => show_config(config.as_deref(), *json),
        Command::Probe { path, json } => Ok(probe(path, *json)),
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "wkd", &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn run_daemon(config_path: Option<&Path>) -> Result<i32> {
    let config = Config::load(config_path)?;
    logger::init_logging(&config.logging)?;

    let mut app = Application::builder()
        .max_wait(config.daemon.max_wait())
        .loader(builtin_loader())
        .build();
    let mut daemon = KernelDaemon::new(config);
    let args = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
    Ok(app.run(&mut daemon, args))
}

fn show_config(config_path: Option<&Path>, as_json: bool) -> Result<i32> {
    let config = Config::load(config_path)?;
    let rendered = if as_json {
        serde_json::to_string_pretty(&config)?
    } else {
        toml::to_string_pretty(&config)
            .map_err(|err| KernelError::runtime(format!("rendering configuration: {err}")))?
    };
    write_stdout(&rendered)?;
    Ok(0)
}

fn probe(path: &Path, as_json: bool) -> i32 {
    let outcome = builtin_loader().probe(path);
    let status = i32::from(outcome.is_err());

    let report = match (&outcome, as_json) {
        (Ok(info), true) => json!({ "ok": true, "module": info }).to_string(),
        (Err(err), true) => json!({
            "ok": false,
            "path": path,
            "code": err.code(),
            "kind": err.kind(),
            "error": err.to_string(),
        })
        .to_string(),
        (Ok(info), false) => format!(
            "{}: component '{}' (abi {}) from {}",
            info.requested.display(),
            info.component,
            info.abi_version,
            info.resolved.display()
        ),
        (Err(err), false) => {
            eprintln!("{err}");
            return status;
        }
    };
    if let Err(err) = write_stdout(&report) {
        eprintln!("{err}");
        return 1;
    }
    status
}

fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").map_err(|err| KernelError::os("writing to stdout", err))
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn probe_parses_path_and_json_flag() {
        let cli = Cli::try_parse_from(["wkd", "probe", "heartbeat", "--json"]).expect("parse");
        match cli.command {
            Command::Probe { path, json } => {
                assert_eq!(path, std::path::PathBuf::from("heartbeat"));
                assert!(json);
            }
            _ => panic!("expected probe"),
        }
    }

    #[test]
    fn run_accepts_short_config_flag() {
        let cli = Cli::try_parse_from(["wkd", "run", "-c", "/tmp/wk.toml"]).expect("parse");
        assert!(matches!(cli.command, Command::Run { config: Some(_) }));
    }
}
