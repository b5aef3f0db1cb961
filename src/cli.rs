// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Name of the target run when none is given on the command line.
pub const DEFAULT_TARGET: &str = "default";

/// Command-line arguments for `pipewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipewatch",
    version,
    about = "Build front-end assets with task pipelines and rebuild them on file changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Task or pipeline to run once.
    ///
    /// `default` (the default) runs the `[default]` build and then keeps
    /// watching the project.
    #[arg(value_name = "TARGET", default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Path to the config file (TOML).
    ///
    /// The directory holding the file is the project root.
    #[arg(long, value_name = "PATH", default_value = "Pipewatch.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print tasks, pipelines and watch bindings, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Watch without starting the development server.
    #[arg(long)]
    pub no_server: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
