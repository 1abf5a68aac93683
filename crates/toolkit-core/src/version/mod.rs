//! Version parsing and the compound full version.
//!
//! A release is identified by a plain semantic version supplied on the
//! command line. Builds additionally stamp a *full version* of the form
//! `<semver>_<epoch>_<shortHash>` so two builds of the same release can be
//! told apart.

mod full;

pub use full::FullVersion;

use semver::Version;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::runner::{CommandExecutor, RunError};

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// A full version string did not have the `semver_epoch_hash` shape.
    #[error("invalid full version `{input}`: expected <semver>_<epoch>_<hash>")]
    InvalidFullVersion {
        /// The rejected input.
        input: String,
    },

    /// The epoch segment of a full version was not a number.
    #[error("invalid epoch `{epoch}` in full version")]
    InvalidEpoch {
        /// The rejected segment.
        epoch: String,
    },

    /// Looking up the commit hash or the current time failed.
    #[error("could not determine build environment: {0}")]
    Environment(#[source] RunError),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.strip_prefix('v').unwrap_or(s);
    Ok(Version::parse(s)?)
}

/// Derive the full version for a build of `version`.
///
/// Runs `git rev-parse --short HEAD` and `date +%s` through `executor`,
/// so the result changes every second.
#[instrument(skip(executor), fields(%version))]
pub fn resolve_full_version(
    version: &Version,
    executor: &dyn CommandExecutor,
) -> VersionResult<FullVersion> {
    let hash = executor
        .run("git rev-parse --short HEAD")
        .map_err(VersionError::Environment)?
        .output
        .trim()
        .to_string();
    let epoch_raw = executor
        .run("date +%s")
        .map_err(VersionError::Environment)?
        .output;
    let epoch_raw = epoch_raw.trim();
    let epoch = epoch_raw.parse().map_err(|_| VersionError::InvalidEpoch {
        epoch: epoch_raw.to_string(),
    })?;

    let full = FullVersion::new(version.clone(), epoch, hash);
    debug!(full_version = %full, "resolved full version");
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, RunResult};
    use std::time::Duration;

    struct Canned;

    impl CommandExecutor for Canned {
        fn run(&self, command: &str) -> RunResult<CommandOutput> {
            let output = match command {
                "git rev-parse --short HEAD" => "55eaf31\n",
                "date +%s" => "1553466344\n",
                other => panic!("unexpected command {other}"),
            };
            Ok(CommandOutput {
                command: command.to_string(),
                output: output.to_string(),
                duration: Duration::ZERO,
            })
        }
    }

    struct NoGit;

    impl CommandExecutor for NoGit {
        fn run(&self, command: &str) -> RunResult<CommandOutput> {
            Err(RunError::Failed {
                command: command.to_string(),
                exit_code: Some(128),
                output: "fatal: not a git repository".to_string(),
            })
        }
    }

    #[test]
    fn parse_with_v_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_without_v_prefix() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_prerelease() {
        let v = parse_version("2.0.0-rc.1+build.5").unwrap();
        assert_eq!(v.pre.as_str(), "rc.1");
        assert_eq!(v.build.as_str(), "build.5");
    }

    #[test]
    fn parse_invalid() {
        assert!(matches!(
            parse_version("1.2"),
            Err(VersionError::InvalidSemver(_))
        ));
        assert!(parse_version("latest").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn resolves_full_version_from_environment() {
        let full = resolve_full_version(&Version::new(0, 0, 1), &Canned).unwrap();
        assert_eq!(full.to_string(), "0.0.1_1553466344_55eaf31");
        assert_eq!(full.epoch(), 1_553_466_344);
        assert_eq!(full.hash(), "55eaf31");
    }

    #[test]
    fn environment_failure_is_reported() {
        let err = resolve_full_version(&Version::new(1, 0, 0), &NoGit).unwrap_err();
        assert!(matches!(err, VersionError::Environment(RunError::Failed { .. })));
    }
}
