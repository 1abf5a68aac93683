//! Stage orchestrator — build, changelog, release, deploy.
//!
//! Each entry point ([`run_build`], [`run_release`], [`run_deploy`]) drives
//! one CLI invocation. External effects go through traits so the same code
//! runs against real processes and recording fakes, and progress is
//! reported through an `on_event` callback instead of printing.
//!
//! # Release sequence
//!
//! 1. **Build** the binary to `<scratch>/<name>_<version>` (unless skipped)
//! 2. **Changelog** collected from the user's editor (unless skipped)
//! 3. **Release** created with the notes as body and the binary attached
//!
//! Deploy is a separate invocation against an already published release.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{ChangelogError, ChangelogSource};
use crate::config::AssetFailurePolicy;
use crate::deploy::{
    ArtifactDownloader, DeployError, DeployTarget, REMOTE_STAGING_DIR, RemoteShell, SshOptions,
    download_url,
};
use crate::github::{DEFAULT_DOWNLOAD_URL, ReleaseApi, Repo};
use crate::project::ProjectInfo;
use crate::publish::{self, AssetUpload, PublishError, PublishOutcome, PublishRequest};
use crate::runner::{CommandExecutor, CommandOutput, RunError};
use crate::template::{self, TemplateError};
use crate::version::{self, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from running a stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Version stamping failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A command template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A build command failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Collecting the changelog failed.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// Publishing the release failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Deploying failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

// ──────────────────────────────────────────────
// Stages and events
// ──────────────────────────────────────────────

/// A named phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Render and run the `build` commands.
    Build,
    /// Collect release notes.
    Changelog,
    /// Create the release and attach the binary.
    Release,
    /// Stage the binary remotely and run the `deploy` commands.
    Deploy,
}

impl Stage {
    /// Key of this stage's command list in the config.
    pub const fn commands_key(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Changelog => "changelog",
            Self::Release => "release",
            Self::Deploy => "deploy",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.commands_key())
    }
}

/// Progress events for the caller to display.
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// A stage has started.
    StageStarted(Stage),
    /// A stage has completed.
    StageCompleted(Stage, StageOutcome),
    /// A rendered command is about to run.
    CommandStarted {
        /// Stage the command belongs to.
        stage: Stage,
        /// The literal command.
        command: String,
    },
    /// A command finished successfully.
    CommandFinished {
        /// Stage the command belongs to.
        stage: Stage,
        /// What the command printed.
        output: CommandOutput,
    },
    /// Informational progress.
    Notice {
        /// Stage the notice belongs to.
        stage: Stage,
        /// Human-readable message.
        message: String,
    },
    /// Something went wrong but the stage continues.
    Warning {
        /// Stage the warning belongs to.
        stage: Stage,
        /// Human-readable message.
        message: String,
    },
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageOutcome {
    /// Stage completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Stage was skipped.
    Skipped {
        /// Why the stage was skipped.
        reason: String,
    },
}

/// Machine-readable summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Results of each stage, in order.
    pub stages: Vec<(Stage, StageOutcome)>,
    /// Project info as it stood at the end of the run.
    pub project: ProjectInfo,
    /// The published release, for release runs.
    pub release: Option<PublishOutcome>,
}

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Options for a release run.
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Do not build or attach a binary.
    pub skip_binary: bool,
    /// Do not open the editor; the release body is empty.
    pub skip_changelog: bool,
    /// What to do when the binary upload fails.
    pub on_asset_failure: AssetFailurePolicy,
    /// Directory the release binary is built into.
    pub scratch_dir: Utf8PathBuf,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            skip_binary: false,
            skip_changelog: false,
            on_asset_failure: AssetFailurePolicy::default(),
            scratch_dir: Utf8PathBuf::from_path_buf(std::env::temp_dir())
                .unwrap_or_else(|_| Utf8PathBuf::from("/tmp")),
        }
    }
}

/// Collaborators for a release run.
pub struct ReleaseDeps<'a> {
    /// Runs build commands.
    pub executor: &'a dyn CommandExecutor,
    /// Produces release notes.
    pub changelog: &'a dyn ChangelogSource,
    /// Creates the release.
    pub api: &'a dyn ReleaseApi,
}

/// Options for a deploy run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Base URL release downloads are served from.
    pub download_base: String,
    /// Connection settings for `scp` and `ssh`.
    pub ssh: SshOptions,
}

impl DeployOptions {
    /// Options downloading from github.com.
    pub fn new(ssh: SshOptions) -> Self {
        Self {
            download_base: DEFAULT_DOWNLOAD_URL.to_string(),
            ssh,
        }
    }
}

/// Collaborators for a deploy run.
pub struct DeployDeps<'a> {
    /// Runs the local `scp`.
    pub executor: &'a dyn CommandExecutor,
    /// Fetches the published binary.
    pub downloader: &'a dyn ArtifactDownloader,
    /// Runs the remote session.
    pub shell: &'a dyn RemoteShell,
}

// ──────────────────────────────────────────────
// Entry points
// ──────────────────────────────────────────────

/// Build the project, writing the binary to `output`.
#[instrument(skip(info, executor, on_event), fields(version = %info.version))]
pub fn run_build(
    info: &mut ProjectInfo,
    output: &Utf8Path,
    executor: &dyn CommandExecutor,
    mut on_event: impl FnMut(StageEvent),
) -> PipelineResult<StageReport> {
    let outcome = build_stage(info, output, executor, &mut on_event)?;
    Ok(StageReport {
        stages: vec![(Stage::Build, outcome)],
        project: info.clone(),
        release: None,
    })
}

/// Build, collect notes, and publish a release.
#[instrument(skip_all, fields(
    version = %info.version,
    skip_binary = options.skip_binary,
    skip_changelog = options.skip_changelog
))]
pub fn run_release(
    info: &mut ProjectInfo,
    options: &ReleaseOptions,
    deps: &ReleaseDeps<'_>,
    mut on_event: impl FnMut(StageEvent),
) -> PipelineResult<StageReport> {
    let mut stages = Vec::new();

    // ── Build ──
    let binary = if options.skip_binary {
        let outcome = StageOutcome::Skipped {
            reason: "--skip-binary flag".into(),
        };
        on_event(StageEvent::StageStarted(Stage::Build));
        on_event(StageEvent::StageCompleted(Stage::Build, outcome.clone()));
        stages.push((Stage::Build, outcome));
        None
    } else {
        let path = info.binary_path_in(&options.scratch_dir);
        let outcome = build_stage(info, &path, deps.executor, &mut on_event)?;
        stages.push((Stage::Build, outcome));
        Some(path)
    };

    // ── Changelog ──
    on_event(StageEvent::StageStarted(Stage::Changelog));
    let changelog = if options.skip_changelog {
        None
    } else {
        let changelog = deps.changelog.collect(info)?;
        if changelog.recovered {
            on_event(StageEvent::Notice {
                stage: Stage::Changelog,
                message: format!("Recovered previous changelog ({})", changelog.path),
            });
        }
        info.record_changelog(changelog.body.clone());
        Some(changelog)
    };
    let outcome = match changelog {
        Some(ref c) => StageOutcome::Success {
            message: format!("{} bytes of release notes", c.body.len()),
        },
        None => StageOutcome::Skipped {
            reason: "--skip-changelog flag".into(),
        },
    };
    on_event(StageEvent::StageCompleted(Stage::Changelog, outcome.clone()));
    stages.push((Stage::Changelog, outcome));

    // ── Release ──
    on_event(StageEvent::StageStarted(Stage::Release));
    let request = PublishRequest {
        repo: Repo {
            owner: &info.username,
            name: &info.name,
        },
        tag: info.tag(),
        body: String::from_utf8_lossy(&info.changelog).into_owned(),
        asset: binary.as_deref().map(|path| AssetUpload {
            name: &info.name,
            path,
        }),
    };
    let published = publish::publish(deps.api, &request, options.on_asset_failure)?;

    if let Some(ref warning) = published.asset_warning {
        on_event(StageEvent::Warning {
            stage: Stage::Release,
            message: format!("binary was not attached: {warning}"),
        });
    }

    if let Some(ref changelog) = changelog
        && let Err(e) = deps.changelog.discard(changelog)
    {
        warn!(error = %e, "could not remove changelog draft");
        on_event(StageEvent::Warning {
            stage: Stage::Release,
            message: e.to_string(),
        });
    }

    let message = match published.asset {
        Some(ref asset) => format!("{} published with {}", published.release.tag_name, asset.name),
        None => format!("{} published", published.release.tag_name),
    };
    info!(%message, "release complete");
    let outcome = StageOutcome::Success { message };
    on_event(StageEvent::StageCompleted(Stage::Release, outcome.clone()));
    stages.push((Stage::Release, outcome));

    Ok(StageReport {
        stages,
        project: info.clone(),
        release: Some(published),
    })
}

/// Deploy a published release to `target`.
#[instrument(skip_all, fields(version = %info.version, %target))]
pub fn run_deploy(
    info: &mut ProjectInfo,
    target: &DeployTarget,
    options: &DeployOptions,
    deps: &DeployDeps<'_>,
    mut on_event: impl FnMut(StageEvent),
) -> PipelineResult<StageReport> {
    on_event(StageEvent::StageStarted(Stage::Deploy));

    let remote_path = info.binary_path_in(Utf8Path::new(REMOTE_STAGING_DIR));
    info.version_full = None;
    info.record_build_path(remote_path.clone());

    // Render before touching the network so a bad template costs nothing.
    let mut commands = template::render_all(info.commands_for(Stage::Deploy.commands_key()), info)?;
    commands.push("exit".to_string());

    let url = download_url(&options.download_base, &info.username, &info.name, &info.version);
    on_event(StageEvent::Notice {
        stage: Stage::Deploy,
        message: format!("Downloading {url}"),
    });
    let artifact = deps.downloader.download(&url)?;
    let local = Utf8PathBuf::from_path_buf(artifact.path().to_path_buf()).map_err(|p| {
        DeployError::Download {
            url: url.clone(),
            message: format!("temporary path is not UTF-8: {}", p.display()),
        }
    })?;

    let scp = options.ssh.scp_command(&local, target, &remote_path);
    let output = run_command(Stage::Deploy, &scp, deps.executor, &mut on_event).map_err(|source| {
        DeployError::Transfer {
            destination: format!("{target}:{remote_path}"),
            source,
        }
    })?;
    debug!(duration_ms = output.duration.as_millis(), "binary staged");
    drop(artifact);

    for command in &commands {
        on_event(StageEvent::CommandStarted {
            stage: Stage::Deploy,
            command: command.clone(),
        });
    }
    let started = std::time::Instant::now();
    let session_output = deps
        .shell
        .run_session(target, &commands)
        .map_err(DeployError::from)?;
    on_event(StageEvent::CommandFinished {
        stage: Stage::Deploy,
        output: CommandOutput {
            command: format!("ssh {target}"),
            output: session_output,
            duration: started.elapsed(),
        },
    });

    let outcome = StageOutcome::Success {
        message: format!(
            "{} deployed to {target} ({} remote commands)",
            info.tag(),
            commands.len() - 1
        ),
    };
    on_event(StageEvent::StageCompleted(Stage::Deploy, outcome.clone()));

    Ok(StageReport {
        stages: vec![(Stage::Deploy, outcome)],
        project: info.clone(),
        release: None,
    })
}

// ──────────────────────────────────────────────
// Stage implementations
// ──────────────────────────────────────────────

/// Stamp the version, render the `build` commands, and run them in order.
fn build_stage(
    info: &mut ProjectInfo,
    output: &Utf8Path,
    executor: &dyn CommandExecutor,
    on_event: &mut impl FnMut(StageEvent),
) -> PipelineResult<StageOutcome> {
    on_event(StageEvent::StageStarted(Stage::Build));

    info.record_build_path(output.to_path_buf());
    let full = version::resolve_full_version(&info.version, executor)?;
    info.record_full_version(full);

    let commands = template::render_all(info.commands_for(Stage::Build.commands_key()), info)?;
    if commands.is_empty() {
        let outcome = StageOutcome::Skipped {
            reason: "no build commands configured".into(),
        };
        on_event(StageEvent::StageCompleted(Stage::Build, outcome.clone()));
        return Ok(outcome);
    }

    for command in &commands {
        run_command(Stage::Build, command, executor, on_event)?;
    }

    let outcome = StageOutcome::Success {
        message: format!("{} command(s) → {output}", commands.len()),
    };
    on_event(StageEvent::StageCompleted(Stage::Build, outcome.clone()));
    Ok(outcome)
}

fn run_command(
    stage: Stage,
    command: &str,
    executor: &dyn CommandExecutor,
    on_event: &mut impl FnMut(StageEvent),
) -> Result<CommandOutput, RunError> {
    on_event(StageEvent::CommandStarted {
        stage,
        command: command.to_string(),
    });
    let output = executor.run(command)?;
    on_event(StageEvent::CommandFinished {
        stage,
        output: output.clone(),
    });
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fakes::{
        FakeChangelog, FakeDownloader, FakeReleaseApi, FakeShell, RecordingExecutor,
    };
    use camino::Utf8Path;
    use chrono::NaiveDate;
    use semver::Version;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn project(commands: &[(&str, &[&str])]) -> ProjectInfo {
        let commands: BTreeMap<String, Vec<String>> = commands
            .iter()
            .map(|(stage, cmds)| {
                (
                    (*stage).to_string(),
                    cmds.iter().map(|c| (*c).to_string()).collect(),
                )
            })
            .collect();
        let config = Config {
            repository: "acme/widget".to_string(),
            commands,
            ..Config::default()
        };
        ProjectInfo::from_config_on(
            &config,
            Version::new(1, 2, 3),
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        )
        .unwrap()
    }

    fn scratch() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, dir)
    }

    // ── build ──

    #[test]
    fn build_runs_rendered_commands() {
        let mut info = project(&[("build", &["echo {{.Version}}"])]);
        let executor = RecordingExecutor::with_shell();
        let mut events = Vec::new();

        let report = run_build(
            &mut info,
            Utf8Path::new("/tmp/widget_1.2.3"),
            &executor,
            |e| events.push(e),
        )
        .unwrap();

        assert_eq!(
            executor.commands(),
            vec!["git rev-parse --short HEAD", "date +%s", "echo 1.2.3"]
        );
        let printed: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StageEvent::CommandFinished { output, .. } => Some(output.output.trim().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(printed, vec!["1.2.3"]);
        assert!(matches!(report.stages[0], (Stage::Build, StageOutcome::Success { .. })));
    }

    #[test]
    fn build_exposes_path_and_full_version() {
        let mut info = project(&[("build", &["go build -o {{.Path}} -X v={{.VersionFull}}"])]);
        let executor = RecordingExecutor::default();

        run_build(&mut info, Utf8Path::new("/out/widget"), &executor, |_| {}).unwrap();

        let last = executor.commands().pop().unwrap();
        assert_eq!(last, "go build -o /out/widget -X v=1.2.3_1700000000_abc1234");
        assert_eq!(
            info.version_full.unwrap().to_string(),
            "1.2.3_1700000000_abc1234"
        );
    }

    #[test]
    fn build_stops_at_first_failure() {
        let mut info = project(&[("build", &["first", "second", "third"])]);
        let executor = RecordingExecutor::failing_on("second");

        let err = run_build(&mut info, Utf8Path::new("/out"), &executor, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Run(RunError::Failed { .. })));
        assert!(!executor.commands().contains(&"third".to_string()));
    }

    #[test]
    fn build_with_unknown_variable_runs_nothing() {
        let mut info = project(&[("build", &["echo ok", "echo {{.Nope}}"])]);
        let executor = RecordingExecutor::default();

        let err = run_build(&mut info, Utf8Path::new("/out"), &executor, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Template(_)));
        assert!(!executor.commands().contains(&"echo ok".to_string()));
    }

    #[test]
    fn build_without_commands_is_skipped() {
        let mut info = project(&[]);
        let executor = RecordingExecutor::default();

        let report = run_build(&mut info, Utf8Path::new("/out"), &executor, |_| {}).unwrap();
        assert!(matches!(report.stages[0].1, StageOutcome::Skipped { .. }));
    }

    // ── release ──

    #[test]
    fn release_with_skips_creates_one_empty_release() {
        let mut info = project(&[("build", &["make"])]);
        let executor = RecordingExecutor::default();
        let changelog = FakeChangelog::new("unused");
        let api = FakeReleaseApi::default();
        let options = ReleaseOptions {
            skip_binary: true,
            skip_changelog: true,
            ..ReleaseOptions::default()
        };
        let deps = ReleaseDeps {
            executor: &executor,
            changelog: &changelog,
            api: &api,
        };

        let report = run_release(&mut info, &options, &deps, |_| {}).unwrap();

        let created = api.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].tag_name, "v1.2.3");
        assert_eq!(created[0].name, "v1.2.3");
        assert_eq!(created[0].body, "");
        assert!(api.uploads().is_empty());
        assert!(executor.commands().is_empty());
        assert_eq!(changelog.collected(), 0);
        assert_eq!(report.stages.len(), 3);
    }

    #[test]
    fn full_release_builds_collects_and_uploads() {
        let (_tmp, dir) = scratch();
        let mut info = project(&[("build", &["touch {{.Path}}"])]);
        let executor = RecordingExecutor::with_shell();
        let changelog = FakeChangelog::new("## v1.2.3\n* shiny");
        let api = FakeReleaseApi::default();
        let options = ReleaseOptions {
            scratch_dir: dir.clone(),
            ..ReleaseOptions::default()
        };
        let deps = ReleaseDeps {
            executor: &executor,
            changelog: &changelog,
            api: &api,
        };

        let report = run_release(&mut info, &options, &deps, |_| {}).unwrap();

        assert_eq!(api.created()[0].body, "## v1.2.3\n* shiny");
        assert_eq!(
            api.uploads(),
            vec![("widget".to_string(), dir.join("widget_1.2.3"))]
        );
        assert_eq!(changelog.discarded(), 1);
        assert_eq!(report.release.unwrap().asset.unwrap().name, "widget");
    }

    #[test]
    fn warn_policy_surfaces_warning_event() {
        let (_tmp, dir) = scratch();
        let mut info = project(&[("build", &["touch {{.Path}}"])]);
        let executor = RecordingExecutor::with_shell();
        let changelog = FakeChangelog::new("notes");
        let api = FakeReleaseApi::failing_uploads();
        let options = ReleaseOptions {
            scratch_dir: dir,
            skip_changelog: true,
            on_asset_failure: AssetFailurePolicy::Warn,
            ..ReleaseOptions::default()
        };
        let deps = ReleaseDeps {
            executor: &executor,
            changelog: &changelog,
            api: &api,
        };
        let mut warnings = Vec::new();

        run_release(&mut info, &options, &deps, |e| {
            if let StageEvent::Warning { message, .. } = e {
                warnings.push(message);
            }
        })
        .unwrap();

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("binary was not attached"));
    }

    #[test]
    fn failed_release_keeps_changelog_draft() {
        let (_tmp, dir) = scratch();
        let mut info = project(&[]);
        let executor = RecordingExecutor::default();
        let changelog = FakeChangelog::new("notes");
        let api = FakeReleaseApi::failing_creates();
        let options = ReleaseOptions {
            scratch_dir: dir,
            skip_binary: true,
            ..ReleaseOptions::default()
        };
        let deps = ReleaseDeps {
            executor: &executor,
            changelog: &changelog,
            api: &api,
        };

        let err = run_release(&mut info, &options, &deps, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Publish(PublishError::Create { .. })));
        assert_eq!(changelog.collected(), 1);
        assert_eq!(changelog.discarded(), 0);
    }

    // ── deploy ──

    #[test]
    fn deploy_downloads_copies_and_runs_session() {
        let mut info = project(&[("deploy", &["echo deployed"])]);
        let executor = RecordingExecutor::default();
        let downloader = FakeDownloader::default();
        let shell = FakeShell::default();
        let target: DeployTarget = "user@host".parse().unwrap();
        let options = DeployOptions::new(SshOptions::resolve(
            None,
            None,
            Some(Utf8Path::new("/home/dev")),
        ));
        let deps = DeployDeps {
            executor: &executor,
            downloader: &downloader,
            shell: &shell,
        };

        run_deploy(&mut info, &target, &options, &deps, |_| {}).unwrap();

        assert_eq!(
            downloader.urls(),
            vec!["https://github.com/acme/widget/releases/download/v1.2.3/widget"]
        );
        let commands = executor.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("scp "));
        assert!(commands[0].ends_with(" user@host:/tmp/widget_1.2.3"));
        assert_eq!(
            shell.sessions(),
            vec![(
                "user@host".to_string(),
                vec!["echo deployed".to_string(), "exit".to_string()]
            )]
        );
    }

    #[test]
    fn deploy_path_points_at_remote_binary() {
        let mut info = project(&[("deploy", &["mv {{.Path}} /usr/local/bin/{{.Name}}"])]);
        let executor = RecordingExecutor::default();
        let downloader = FakeDownloader::default();
        let shell = FakeShell::default();
        let target: DeployTarget = "ops@box".parse().unwrap();
        let options = DeployOptions::new(SshOptions::resolve(None, None, None));
        let deps = DeployDeps {
            executor: &executor,
            downloader: &downloader,
            shell: &shell,
        };

        run_deploy(&mut info, &target, &options, &deps, |_| {}).unwrap();

        let (_, sent) = shell.sessions().pop().unwrap();
        assert_eq!(sent[0], "mv /tmp/widget_1.2.3 /usr/local/bin/widget");
        assert!(info.version_full.is_none());
    }

    #[test]
    fn deploy_template_error_happens_before_download() {
        let mut info = project(&[("deploy", &["echo {{.Missing}}"])]);
        let executor = RecordingExecutor::default();
        let downloader = FakeDownloader::default();
        let shell = FakeShell::default();
        let target: DeployTarget = "user@host".parse().unwrap();
        let options = DeployOptions::new(SshOptions::resolve(None, None, None));
        let deps = DeployDeps {
            executor: &executor,
            downloader: &downloader,
            shell: &shell,
        };

        let err = run_deploy(&mut info, &target, &options, &deps, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Template(_)));
        assert!(downloader.urls().is_empty());
    }

    #[test]
    fn failed_scp_is_a_transfer_error() {
        let mut info = project(&[("deploy", &["echo deployed"])]);
        let executor = RecordingExecutor::failing_on("scp");
        let downloader = FakeDownloader::default();
        let shell = FakeShell::default();
        let target: DeployTarget = "user@host".parse().unwrap();
        let options = DeployOptions::new(SshOptions::resolve(None, None, None));
        let deps = DeployDeps {
            executor: &executor,
            downloader: &downloader,
            shell: &shell,
        };

        let err = run_deploy(&mut info, &target, &options, &deps, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Deploy(DeployError::Transfer { .. })));
        assert!(shell.sessions().is_empty());
    }

    #[test]
    fn stage_outcome_serializes_with_status_tag() {
        let outcome = StageOutcome::Skipped {
            reason: "--skip-binary flag".into(),
        };
        let json = serde_json::to_value((Stage::Build, outcome)).unwrap();
        assert_eq!(json[0], "build");
        assert_eq!(json[1]["status"], "skipped");
    }
}
