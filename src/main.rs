//! `wkd`: the watchkeeper daemon binary.

use clap::Parser;

use watchkeeper::cli_app::{self, Cli};

fn main() {
    let cli = Cli::parse();
    let status = match cli_app::run(&cli) {
        Ok(status) => status,
        Err(err) => {
            eprintln!("wkd: {err}");
            watchkeeper::daemon::EXIT_FAILURE
        }
    };
    std::process::exit(status);
}
