//! Library interface for the `toolkit` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for testing. The actual entry point is in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    GITHUB_TOKEN            Token for creating releases
    VISUAL, EDITOR          Editor for the changelog (falls back to vi)
    DEBUG                   Set to true for debug logs mirrored to stderr
    RUST_LOG                Log filter (e.g., debug, toolkit_core=trace)
    TOOLKIT_LOG_PATH        Explicit log file path
    TOOLKIT_LOG_DIR         Log directory
";

/// Command-line interface definition for toolkit.
#[derive(Parser)]
#[command(name = "toolkit")]
#[command(about = "Build, release, and deploy helper for simple projects", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print each command before running it
    #[arg(long, global = true, alias = "echoCommands")]
    pub echo_commands: bool,

    /// Do not print command output
    #[arg(long, global = true, alias = "hideOutput")]
    pub hide_output: bool,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Build a versioned binary from the configured build commands
    Build(commands::build::BuildArgs),

    /// Build, write a changelog, and publish a GitHub release
    Release(commands::release::ReleaseArgs),

    /// Download a published release and deploy it over ssh
    Deploy(commands::deploy::DeployArgs),
}

/// Returns the clap command, for introspection in tests.
pub fn command() -> clap::Command {
    Cli::command()
}
