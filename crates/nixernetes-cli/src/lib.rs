//! Nixernetes CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand, ValueEnum};

use nixernetes_common::telemetry::{LogConfig, LogFormat};

/// Nixernetes - compile declared intent into compliant Kubernetes manifests
#[derive(Parser, Debug)]
#[command(name = "nixernetes")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format (logs go to stderr; filter with RUST_LOG)
    #[arg(long, value_enum, default_value = "plain", global = true)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Plain,
    /// One JSON object per event
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile application declarations into a manifest
    Compile(commands::compile::CompileArgs),
    /// Validate an existing multi-document manifest
    Validate(commands::validate::ValidateArgs),
    /// Print the JSON schema of application declarations
    Schema(commands::schema::SchemaArgs),
    /// List supported Kubernetes versions or one version's apiVersion table
    Versions(commands::versions::VersionsArgs),
    /// Show compliance levels and environment profiles
    Profiles(commands::profiles::ProfilesArgs),
}

impl Cli {
    /// Logging setup for this invocation
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: match self.log_format {
                LogFormatArg::Plain => LogFormat::Plain,
                LogFormatArg::Json => LogFormat::Json,
            },
            ..Default::default()
        }
    }

    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Compile(args) => commands::compile::run(args),
            Commands::Validate(args) => commands::validate::run(args),
            Commands::Schema(args) => commands::schema::run(args),
            Commands::Versions(args) => commands::versions::run(args),
            Commands::Profiles(args) => commands::profiles::run(args),
        }
    }
}
