//! Recording fakes for the pipeline's collaborator traits (testing only).

use std::sync::Mutex;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;

use crate::changelog::{Changelog, ChangelogResult, ChangelogSource};
use crate::deploy::{ArtifactDownloader, DeployResult, DeployTarget, RemoteShell, SshResult};
use crate::github::{Asset, NewRelease, Release, ReleaseApi, ReleaseError, ReleaseResult, Repo};
use crate::project::ProjectInfo;
use crate::runner::{CommandExecutor, CommandOutput, RunError, RunResult, ShellRunner};

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// Records every command. Answers the version-stamp lookups itself and
/// either echoes success or hands other commands to a real shell.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    commands: Mutex<Vec<String>>,
    shell: Option<ShellRunner>,
    fail_prefix: Option<String>,
}

impl RecordingExecutor {
    /// Run non-stamp commands through `bash`.
    pub fn with_shell() -> Self {
        Self {
            shell: Some(ShellRunner::new()),
            ..Self::default()
        }
    }

    /// Fail any command starting with `prefix`.
    pub fn failing_on(prefix: &str) -> Self {
        Self {
            fail_prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, command: &str) -> RunResult<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());

        let canned = match command {
            "git rev-parse --short HEAD" => Some("abc1234\n"),
            "date +%s" => Some("1700000000\n"),
            _ => None,
        };
        if let Some(output) = canned {
            return Ok(CommandOutput {
                command: command.to_string(),
                output: output.to_string(),
                duration: Duration::ZERO,
            });
        }

        if let Some(ref prefix) = self.fail_prefix
            && command.starts_with(prefix.as_str())
        {
            return Err(RunError::Failed {
                command: command.to_string(),
                exit_code: Some(1),
                output: "simulated failure".to_string(),
            });
        }

        match self.shell {
            Some(ref shell) => shell.run(command),
            None => Ok(CommandOutput {
                command: command.to_string(),
                output: String::new(),
                duration: Duration::ZERO,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeChangelog
// ---------------------------------------------------------------------------

/// Returns fixed notes and counts collect/discard calls.
#[derive(Debug)]
pub struct FakeChangelog {
    body: String,
    collected: Mutex<usize>,
    discarded: Mutex<usize>,
}

impl FakeChangelog {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            collected: Mutex::new(0),
            discarded: Mutex::new(0),
        }
    }

    pub fn collected(&self) -> usize {
        *self.collected.lock().unwrap()
    }

    pub fn discarded(&self) -> usize {
        *self.discarded.lock().unwrap()
    }
}

impl ChangelogSource for FakeChangelog {
    fn collect(&self, info: &ProjectInfo) -> ChangelogResult<Changelog> {
        *self.collected.lock().unwrap() += 1;
        Ok(Changelog {
            path: Utf8PathBuf::from(format!("/fake/changelog_{}_{}.md", info.name, info.version)),
            body: self.body.as_bytes().to_vec(),
            recovered: false,
        })
    }

    fn discard(&self, _changelog: &Changelog) -> ChangelogResult<()> {
        *self.discarded.lock().unwrap() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeReleaseApi
// ---------------------------------------------------------------------------

/// In-memory releases API.
#[derive(Debug, Default)]
pub struct FakeReleaseApi {
    created: Mutex<Vec<NewRelease>>,
    uploads: Mutex<Vec<(String, Utf8PathBuf)>>,
    fail_creates: bool,
    fail_uploads: bool,
}

impl FakeReleaseApi {
    pub fn failing_creates() -> Self {
        Self {
            fail_creates: true,
            ..Self::default()
        }
    }

    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<NewRelease> {
        self.created.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, Utf8PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl ReleaseApi for FakeReleaseApi {
    fn create_release(&self, _repo: Repo<'_>, release: &NewRelease) -> ReleaseResult<Release> {
        if self.fail_creates {
            return Err(ReleaseError::Api {
                status: 422,
                message: "Validation Failed".to_string(),
            });
        }
        self.created.lock().unwrap().push(release.clone());
        Ok(Release {
            id: 1,
            tag_name: release.tag_name.clone(),
            html_url: String::new(),
        })
    }

    fn upload_asset(
        &self,
        _repo: Repo<'_>,
        _release_id: u64,
        name: &str,
        path: &Utf8Path,
    ) -> ReleaseResult<Asset> {
        if self.fail_uploads {
            return Err(ReleaseError::Api {
                status: 500,
                message: "upload exploded".to_string(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((name.to_string(), path.to_path_buf()));
        Ok(Asset {
            id: 2,
            name: name.to_string(),
            browser_download_url: String::new(),
        })
    }

    fn delete_release(&self, _repo: Repo<'_>, _release_id: u64) -> ReleaseResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeDownloader / FakeShell
// ---------------------------------------------------------------------------

/// Records URLs and hands back an empty temp file.
#[derive(Debug, Default)]
pub struct FakeDownloader {
    urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl ArtifactDownloader for FakeDownloader {
    fn download(&self, url: &str) -> DeployResult<NamedTempFile> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(NamedTempFile::new().unwrap())
    }
}

/// Records each session's target and commands.
#[derive(Debug, Default)]
pub struct FakeShell {
    sessions: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeShell {
    pub fn sessions(&self) -> Vec<(String, Vec<String>)> {
        self.sessions.lock().unwrap().clone()
    }
}

impl RemoteShell for FakeShell {
    fn run_session(&self, target: &DeployTarget, commands: &[String]) -> SshResult<String> {
        self.sessions
            .lock()
            .unwrap()
            .push((target.to_string(), commands.to_vec()));
        Ok(String::new())
    }
}
