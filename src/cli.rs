// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `filemill`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "filemill",
    version,
    about = "Process files into output directories and track them in a manifest.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Filemill.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Filemill.toml")]
    pub config: String,

    /// Keep running and recompile on file changes.
    #[arg(long)]
    pub watch: bool,

    /// Force mtime polling instead of native file watching, with an
    /// optional interval in milliseconds.
    #[arg(long, value_name = "MS", num_args = 0..=1, default_missing_value = "300")]
    pub poll: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FILEMILL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print the processors, but don't run.
    #[arg(long)]
    pub dry_run: bool,
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
