//! Project info — the record every stage renders its commands against.
//!
//! A [`ProjectInfo`] is built once per invocation from the loaded
//! [`Config`] and the requested version, then filled in as stages run: the
//! build stage records the full version and output path, the changelog
//! stage records the edited notes, and the deploy stage points the path at
//! the binary staged on the remote host.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use semver::Version;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::Config;
use crate::git;
use crate::version::FullVersion;

/// Errors from building project info.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// The configured repository is not in `owner/name` form.
    #[error("invalid repository `{repository}`: expected owner/name")]
    InvalidRepository {
        /// The rejected value.
        repository: String,
    },
}

/// Result alias for project info operations.
pub type ProjectResult<T> = Result<T, ProjectError>;

/// Date format used for the `Date` template variable, e.g. `March 25, 2019`.
pub const DATE_FORMAT: &str = "%B %-d, %Y";

// ──────────────────────────────────────────────
// Types
// ──────────────────────────────────────────────

/// Everything known about the project for the current invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    /// Repository name (second half of `owner/name`).
    pub name: String,
    /// Repository owner (first half of `owner/name`).
    pub username: String,
    /// The repository as `owner/name`.
    pub repository: String,
    /// The release version, without a `v` prefix.
    pub version: Version,
    /// Build-stamped version, set once a build runs.
    pub version_full: Option<FullVersion>,
    /// Where the binary is written locally, or staged remotely on deploy.
    pub build_path: Option<Utf8PathBuf>,
    /// Human-readable date of this invocation.
    pub date: String,
    /// Edited changelog contents.
    #[serde(serialize_with = "serialize_lossy")]
    pub changelog: Vec<u8>,
    /// Command templates keyed by stage name.
    pub commands: BTreeMap<String, Vec<String>>,
}

fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

impl ProjectInfo {
    /// Build project info for `version`, dated today.
    pub fn from_config(config: &Config, version: Version) -> ProjectResult<Self> {
        Self::from_config_on(config, version, chrono::Local::now().date_naive())
    }

    /// Build project info for `version` with an explicit date.
    pub fn from_config_on(config: &Config, version: Version, date: NaiveDate) -> ProjectResult<Self> {
        let (username, name) = parse_repository(&config.repository)?;
        Ok(Self {
            repository: format!("{username}/{name}"),
            name,
            username,
            version,
            version_full: None,
            build_path: None,
            date: date.format(DATE_FORMAT).to_string(),
            changelog: Vec::new(),
            commands: config.commands.clone(),
        })
    }

    /// The release tag, `v` + version.
    pub fn tag(&self) -> String {
        format!("v{}", self.version)
    }

    /// Command templates configured for a stage, or an empty slice.
    pub fn commands_for(&self, stage: &str) -> &[String] {
        self.commands.get(stage).map_or(&[], Vec::as_slice)
    }

    /// Deterministic scratch path for this project and version,
    /// `<dir>/<name>_<version>`.
    pub fn binary_path_in(&self, dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(format!("{}_{}", self.name, self.version))
    }

    /// Record the stamped version from a build.
    pub fn record_full_version(&mut self, full: FullVersion) {
        self.version_full = Some(full);
    }

    /// Record where the binary lives.
    pub fn record_build_path(&mut self, path: Utf8PathBuf) {
        self.build_path = Some(path);
    }

    /// Record the edited changelog.
    pub fn record_changelog(&mut self, changelog: Vec<u8>) {
        self.changelog = changelog;
    }

    /// Value of a template variable, or `None` if the name is unknown.
    ///
    /// Known variables that have not been filled in yet resolve to an empty
    /// string.
    pub fn variable(&self, name: &str) -> Option<String> {
        let value = match name {
            "Name" | "ProjectName" => self.name.clone(),
            "Username" => self.username.clone(),
            "Repository" => self.repository.clone(),
            "Version" => self.version.to_string(),
            "Tag" => self.tag(),
            "VersionFull" => self
                .version_full
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "Path" | "BuildPath" => self
                .build_path
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "Date" => self.date.clone(),
            _ => return None,
        };
        Some(value)
    }
}

/// Split a repository into `(owner, name)`.
///
/// Accepts `owner/name` as well as the remote URL forms understood by
/// [`git::parse_owner_repo`].
pub fn parse_repository(repository: &str) -> ProjectResult<(String, String)> {
    let invalid = || ProjectError::InvalidRepository {
        repository: repository.to_string(),
    };

    if repository.contains("://") || repository.starts_with("git@") {
        return git::parse_owner_repo(repository).ok_or_else(invalid);
    }

    match repository.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => {
            Ok(((*owner).to_string(), (*name).to_string()))
        }
        _ => Err(invalid()),
    }
}
