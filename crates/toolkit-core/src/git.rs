//! Git lookups.
//!
//! Shells out to `git` so the user's own configuration applies. Only used
//! to recover the repository identity when the config does not name one;
//! the build stamp goes through the command runner instead.

use std::process::Command;

use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "remote").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Get the URL of a named remote, or `None` if it is not configured.
#[instrument]
pub fn remote_url(remote: &str) -> GitResult<Option<String>> {
    match git(&["remote", "get-url", remote]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Derive `owner/name` from the `origin` remote, if there is one.
pub fn origin_repository() -> GitResult<Option<String>> {
    let Some(url) = remote_url("origin")? else {
        return Ok(None);
    };
    Ok(parse_owner_repo(&url).map(|(owner, repo)| format!("{owner}/{repo}")))
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = match url.strip_prefix("git@") {
        Some(rest) => rest.split_once(':').map(|(_, path)| path),
        None => url
            .split_once("://")
            .and_then(|(_, after_scheme)| after_scheme.split_once('/'))
            .map(|(_, path)| path),
    }?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Run a git command and return its stdout.
fn git(args: &[&str]) -> GitResult<String> {
    let output = Command::new("git").args(args).output()?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("not a git repository") {
        return Err(GitError::NotARepo);
    }

    Err(GitError::Command {
        command: args.first().unwrap_or(&"").to_string(),
        stderr,
    })
}
