//! Core library for toolkit.
//!
//! This crate provides the release machinery behind the `toolkit` CLI:
//! configuration, command templating, shell execution, changelog editing,
//! GitHub releases, and remote deploys.
//!
//! # Modules
//!
//! - [`changelog`] - Changelog drafts edited in the user's editor
//! - [`config`] - Configuration loading and management
//! - [`deploy`] - Release downloads and remote shell sessions
//! - [`error`] - Configuration error types
//! - [`git`] - Repository identity from git remotes
//! - [`github`] - Token discovery and the releases API
//! - [`pipeline`] - Build, release, and deploy orchestration
//! - [`project`] - The per-invocation project record
//! - [`publish`] - Release creation with asset upload policy
//! - [`runner`] - Shell command execution
//! - [`template`] - `{{.Field}}` command templating
//! - [`version`] - Version parsing and build stamping
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use toolkit_core::{ConfigLoader, ProjectInfo, ShellRunner, pipeline, version};
//!
//! let config = ConfigLoader::new()
//!     .with_project_search(".")
//!     .load_or_error()
//!     .expect("Failed to load configuration");
//!
//! let version = version::parse_version("v1.2.3").unwrap();
//! let mut info = ProjectInfo::from_config(&config, version).unwrap();
//! let runner = ShellRunner::new();
//! pipeline::run_build(&mut info, Utf8Path::new("/tmp/app"), &runner, |_| {}).unwrap();
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod config;

pub mod deploy;

pub mod error;

pub mod git;

pub mod github;

pub mod pipeline;

pub mod project;

pub mod publish;

pub mod runner;

pub mod template;

pub mod version;

#[cfg(test)]
mod fakes;

pub use config::{AssetFailurePolicy, Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use project::ProjectInfo;

pub use runner::{CommandExecutor, ShellRunner};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
