//! Configuration loading and discovery.
//!
//! A project describes itself in a small YAML file:
//!
//! ```yaml
//! repository: acme/widget
//! commands:
//!   build:
//!     - go build -o {{.Path}} -ldflags "-X main.version={{.VersionFull}}"
//!   deploy:
//!     - sudo mv {{.Path}} /usr/local/bin/{{.Name}}
//! ```
//!
//! # Config file locations
//! An explicit file passed with `--config` is used on its own. Otherwise,
//! in order of precedence (highest first):
//! - `.toolkit.yml` / `.toolkit.yaml` / `toolkit.yml` / `toolkit.yaml` in the
//!   current directory or any parent (stopping at a `.git` boundary)
//! - `~/.config/toolkit/config.yml` (user config)
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use toolkit_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load_or_error()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Per-project configuration.
///
/// Missing fields take their zero-values: an empty repository and no
/// commands. Nothing else is defaulted.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Repository identifier in `owner/name` form.
    pub repository: String,
    /// Command templates keyed by stage name (`build`, `deploy`, ...).
    pub commands: BTreeMap<String, Vec<String>>,
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Release publishing settings.
    pub release: Option<ReleaseConfig>,
    /// Remote deploy settings.
    pub deploy: Option<DeployConfig>,
}

impl Config {
    /// The asset failure policy, falling back to [`AssetFailurePolicy::Fail`].
    pub fn asset_failure_policy(&self) -> AssetFailurePolicy {
        self.release
            .as_ref()
            .and_then(|r| r.on_asset_failure)
            .unwrap_or_default()
    }
}

/// Release publishing settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Base URL of the hosting API (default: `https://api.github.com`).
    pub api_url: Option<String>,
    /// Base URL for asset uploads (default: `https://uploads.github.com`).
    pub upload_url: Option<String>,
    /// Base URL that serves release downloads (default: `https://github.com`).
    pub download_url: Option<String>,
    /// What to do when the binary upload fails after the release exists.
    pub on_asset_failure: Option<AssetFailurePolicy>,
}

/// Remote deploy settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeployConfig {
    /// Private key used for the remote shell (default: `~/.ssh/id_rsa`).
    pub identity_file: Option<String>,
    /// Remote shell port (default: 22).
    pub port: Option<u16>,
}

/// Policy applied when uploading a release asset fails after the release
/// itself was created.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetFailurePolicy {
    /// Propagate the upload error; the created release is left in place.
    #[default]
    Fail,
    /// Log a warning and report success.
    Warn,
    /// Delete the created release, then propagate the upload error.
    Rollback,
}

impl std::fmt::Display for AssetFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Warn => write!(f, "warn"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Project config file names, in order of preference.
const CONFIG_NAMES: &[&str] = &[".toolkit.yml", ".toolkit.yaml", "toolkit.yml", "toolkit.yaml"];

/// Application name for XDG directory lookup.
const APP_NAME: &str = "toolkit";

/// Directory entry that marks a repository root; the search stops there.
const BOUNDARY_MARKER: &str = ".git";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Explicit config files to load.
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/toolkit/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Explicit files must exist. When any is given, the project and user
    /// configs are not read.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration.
    ///
    /// Explicit files (later ones win) replace discovery entirely.
    /// Otherwise, precedence (highest to lowest):
    /// 1. Project config (closest to search root)
    /// 2. User config (`~/.config/toolkit/config.yml`)
    /// 3. Zero values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let discover = self.explicit_files.is_empty();

        if discover
            && self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = figment.merge(Yaml::file_exact(user_config.as_str()));
        }

        if discover
            && let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            tracing::debug!(path = %project_config, "found project config");
            figment = figment.merge(Yaml::file_exact(project_config.as_str()));
        }

        for file in &self.explicit_files {
            if !file.is_file() {
                return Err(ConfigError::Missing { path: file.clone() });
            }
            figment = figment.merge(Yaml::file_exact(file.as_str()));
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            repository = %config.repository,
            stages = config.commands.len(),
            log_level = config.log_level.as_str(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no project or explicit
    /// config file is found.
    ///
    /// User config alone is not enough: it cannot name a repository for the
    /// project at hand.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for name in CONFIG_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            // The boundary directory itself is searched; its parents are not.
            if dir.join(BOUNDARY_MARKER).exists() {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
        let config_dir = proj_dirs.config_dir();

        for name in ["config.yml", "config.yaml"] {
            let config_path = config_dir.join(name);
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }
}
