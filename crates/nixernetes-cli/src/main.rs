//! Nixernetes CLI
//!
//! Compiles application declarations into compliant Kubernetes manifests.

use std::process::ExitCode;

use clap::Parser;

use nixernetes_cli::Cli;
use nixernetes_common::telemetry::init_logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_config()) {
        eprintln!("warning: {}", e);
    }

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
