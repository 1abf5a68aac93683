//! Remote deploy plumbing: release downloads and remote shell sessions.
//!
//! A deploy fetches the published binary, copies it onto the target host
//! with `scp`, then opens a single `ssh` session and feeds it the rendered
//! deploy commands on stdin. Both network edges sit behind traits
//! ([`ArtifactDownloader`], [`RemoteShell`]) so the stage can be tested
//! without a network.

use std::fmt;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::github::HTTP_TIMEOUT;
use crate::runner::RunError;

/// Directory on the remote host where the binary is staged.
pub const REMOTE_STAGING_DIR: &str = "/tmp";

/// Default remote shell port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default private key, relative to the home directory.
pub const DEFAULT_IDENTITY: &str = ".ssh/id_rsa";

const USER_AGENT: &str = concat!("toolkit/", env!("CARGO_PKG_VERSION"));

/// Errors from deploying.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The destination was not `user@host`.
    #[error("invalid deploy target `{target}`: expected user@host")]
    InvalidTarget {
        /// The rejected value.
        target: String,
    },

    /// The release binary could not be downloaded.
    #[error("could not download {url}: {message}")]
    Download {
        /// The URL that was requested.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// Copying the binary to the remote host failed.
    #[error("could not copy binary to {destination}: {source}")]
    Transfer {
        /// The `user@host:path` destination.
        destination: String,
        /// The failed `scp` invocation.
        source: RunError,
    },

    /// The remote shell session failed.
    #[error(transparent)]
    Ssh(#[from] SshError),
}

/// Result alias for deploy operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors from the remote shell.
#[derive(Error, Debug)]
pub enum SshError {
    /// The private key does not exist.
    #[error("ssh key not found: {path}")]
    KeyNotFound {
        /// The expected key path.
        path: Utf8PathBuf,
    },

    /// The `ssh` client could not be started.
    #[error("failed to start ssh: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing commands to the session failed.
    #[error("failed to send commands to remote shell: {0}")]
    Transmit(#[source] std::io::Error),

    /// The session ended unsuccessfully.
    #[error("remote session ended with {status}: {output}")]
    Session {
        /// Exit status description.
        status: String,
        /// Combined session output.
        output: String,
    },
}

/// Result alias for remote shell operations.
pub type SshResult<T> = Result<T, SshError>;

// ──────────────────────────────────────────────
// Target
// ──────────────────────────────────────────────

/// A `user@host` deploy destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    /// Remote login.
    pub user: String,
    /// Remote host name or address.
    pub host: String,
}

impl FromStr for DeployTarget {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((user, host)) if !user.is_empty() && !host.is_empty() && !host.contains('@') => {
                Ok(Self {
                    user: user.to_string(),
                    host: host.to_string(),
                })
            }
            _ => Err(DeployError::InvalidTarget {
                target: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

/// URL a published binary is downloaded from.
pub fn download_url(base: &str, owner: &str, name: &str, version: &semver::Version) -> String {
    format!(
        "{}/{owner}/{name}/releases/download/v{version}/{name}",
        base.trim_end_matches('/')
    )
}

/// Connection settings shared by `scp` and `ssh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    /// Private key to authenticate with.
    pub identity_file: Utf8PathBuf,
    /// Remote port.
    pub port: u16,
}

impl SshOptions {
    /// Resolve options from configured values, defaulting to
    /// `~/.ssh/id_rsa` on port 22. A leading `~/` is expanded.
    pub fn resolve(identity_file: Option<&str>, port: Option<u16>, home: Option<&Utf8Path>) -> Self {
        let identity_file = match identity_file {
            Some(path) => expand_home(path, home),
            None => home.map_or_else(
                || Utf8PathBuf::from("~").join(DEFAULT_IDENTITY),
                |h| h.join(DEFAULT_IDENTITY),
            ),
        };
        Self {
            identity_file,
            port: port.unwrap_or(DEFAULT_SSH_PORT),
        }
    }

    /// The `scp` command copying `local` to `remote_path` on `target`.
    ///
    /// Uses the same key and host-key settings as the session.
    pub fn scp_command(&self, local: &Utf8Path, target: &DeployTarget, remote_path: &Utf8Path) -> String {
        let mut args = vec!["scp".to_string(), "-P".to_string(), self.port.to_string()];
        args.extend(self.auth_args());
        args.push(local.to_string());
        args.push(format!("{target}:{remote_path}"));
        args.join(" ")
    }

    /// Arguments for a non-interactive `ssh` session to `target`.
    pub fn ssh_args(&self, target: &DeployTarget) -> Vec<String> {
        let mut args = vec!["-T".to_string(), "-p".to_string(), self.port.to_string()];
        args.extend(self.auth_args());
        args.push(target.to_string());
        args
    }

    /// Key and host-key options shared by `scp` and `ssh`.
    fn auth_args(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string(), self.identity_file.to_string()];
        for option in SSH_OPTIONS {
            args.push("-o".to_string());
            args.push((*option).to_string());
        }
        args
    }
}

const SSH_OPTIONS: &[&str] = &[
    "StrictHostKeyChecking=no",
    "UserKnownHostsFile=/dev/null",
    "BatchMode=yes",
    "ConnectTimeout=10",
];

fn expand_home(path: &str, home: Option<&Utf8Path>) -> Utf8PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Utf8PathBuf::from(path),
    }
}

// ──────────────────────────────────────────────
// Download
// ──────────────────────────────────────────────

/// Fetches a published artifact to a local temporary file.
pub trait ArtifactDownloader {
    /// Download `url`; the file is removed when the handle drops.
    fn download(&self, url: &str) -> DeployResult<NamedTempFile>;
}

/// Downloads over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    http: Client,
}

impl HttpDownloader {
    /// Create a downloader with the standard user agent and timeout.
    pub fn new() -> DeployResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| DeployError::Download {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { http })
    }
}

impl ArtifactDownloader for HttpDownloader {
    #[instrument(skip(self))]
    fn download(&self, url: &str) -> DeployResult<NamedTempFile> {
        let fail = |message: String| DeployError::Download {
            url: url.to_string(),
            message,
        };

        let mut response = self.http.get(url).send().map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("server responded {status}")));
        }

        let mut file = NamedTempFile::new().map_err(|e| fail(e.to_string()))?;
        let bytes = response
            .copy_to(file.as_file_mut())
            .map_err(|e| fail(e.to_string()))?;
        info!(bytes, path = %file.path().display(), "downloaded release binary");
        Ok(file)
    }
}

// ──────────────────────────────────────────────
// Remote shell
// ──────────────────────────────────────────────

/// Runs a list of commands in one remote shell session.
pub trait RemoteShell {
    /// Send each command, in order, and wait for the session to end.
    ///
    /// Returns the session's combined output.
    fn run_session(&self, target: &DeployTarget, commands: &[String]) -> SshResult<String>;
}

/// Remote shell over the system `ssh` client.
///
/// Host keys are not verified.
#[derive(Debug, Clone)]
pub struct SshShell {
    options: SshOptions,
    program: Vec<String>,
}

impl SshShell {
    /// Create a shell using `options`.
    pub fn new(options: SshOptions) -> Self {
        Self {
            options,
            program: vec!["ssh".to_string()],
        }
    }

    /// Run `program` (with its own leading arguments) instead of `ssh`.
    pub fn with_program<I, S>(mut self, program: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into_iter().map(Into::into).collect();
        self
    }
}

impl RemoteShell for SshShell {
    #[instrument(skip(self, commands), fields(%target, count = commands.len()))]
    fn run_session(&self, target: &DeployTarget, commands: &[String]) -> SshResult<String> {
        if !self.options.identity_file.is_file() {
            return Err(SshError::KeyNotFound {
                path: self.options.identity_file.clone(),
            });
        }

        let (mut reader, writer) = std::io::pipe().map_err(SshError::Spawn)?;
        let writer_clone = writer.try_clone().map_err(SshError::Spawn)?;

        let Some((program, leading)) = self.program.split_first() else {
            return Err(SshError::Spawn(std::io::Error::other("no ssh program configured")));
        };
        let mut cmd = Command::new(program);
        cmd.args(leading)
            .args(self.options.ssh_args(target))
            .stdin(Stdio::piped())
            .stdout(writer_clone)
            .stderr(writer);
        let mut child = cmd.spawn().map_err(SshError::Spawn)?;
        drop(cmd);

        {
            let Some(mut stdin) = child.stdin.take() else {
                return Err(SshError::Transmit(std::io::Error::other(
                    "ssh stdin was not captured",
                )));
            };
            for command in commands {
                debug!(%command, "sending remote command");
                stdin
                    .write_all(format!("{command}\n").as_bytes())
                    .map_err(SshError::Transmit)?;
            }
        }

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(SshError::Transmit)?;
        let status = child.wait().map_err(SshError::Transmit)?;
        let output = String::from_utf8_lossy(&buf).into_owned();

        if !status.success() {
            return Err(SshError::Session {
                status: status.to_string(),
                output,
            });
        }
        info!("remote session finished");
        Ok(output)
    }
}
