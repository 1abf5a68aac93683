//! Release command — build, collect notes, publish to GitHub.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use tracing::{debug, instrument};

use toolkit_core::changelog::ChangelogEditor;
use toolkit_core::config::Config;
use toolkit_core::github::{self, GithubClient};
use toolkit_core::pipeline::{self, ReleaseDeps, ReleaseOptions};
use toolkit_core::runner::ShellRunner;

use super::{OutputOptions, Progress};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Version to release (e.g., "1.2.3" or "v1.2.3")
    pub semver: String,

    /// Do not build or attach a binary
    #[arg(long, aliases = ["skip-build", "skipBinary", "skipBuild"])]
    pub skip_binary: bool,

    /// Do not open an editor for release notes
    #[arg(long, alias = "skipChangelog")]
    pub skip_changelog: bool,

    /// File holding the GitHub token
    #[arg(short, long, alias = "tokenFile", value_name = "FILE")]
    pub token_file: Option<Utf8PathBuf>,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all, fields(semver = %args.semver))]
pub fn cmd_release(
    args: ReleaseArgs,
    output: OutputOptions,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = output.json,
        skip_binary = args.skip_binary,
        skip_changelog = args.skip_changelog,
        "executing release command"
    );

    let mut info = super::load_project(config, &args.semver)?;

    // Fail on a missing token before anything is built.
    let token = github::discover_token(args.token_file.as_deref())
        .context("could not find a GitHub token")?;
    let api = github_client(config, token)?;

    let runner = ShellRunner::new().with_working_dir(cwd);
    let editor = ChangelogEditor::new();
    let options = ReleaseOptions {
        skip_binary: args.skip_binary,
        skip_changelog: args.skip_changelog,
        on_asset_failure: config.asset_failure_policy(),
        ..ReleaseOptions::default()
    };
    let deps = ReleaseDeps {
        executor: &runner,
        changelog: &editor,
        api: &api,
    };

    let mut progress = Progress::new(output);
    let report = pipeline::run_release(&mut info, &options, &deps, |event| {
        progress.handle(event);
    })
    .context("release failed")?;
    drop(progress);

    let url = report
        .release
        .as_ref()
        .map(|published| published.release.html_url.clone())
        .unwrap_or_default();
    super::print_report(&report, output, &format!("Released {} {}", info.tag(), url))
}

/// Build the API client, honoring endpoint overrides in the config.
fn github_client(config: &Config, token: String) -> anyhow::Result<GithubClient> {
    let mut client = GithubClient::new(token).context("could not create GitHub client")?;
    if let Some(ref release) = config.release {
        if let Some(ref url) = release.api_url {
            client = client.with_api_url(url.as_str());
        }
        if let Some(ref url) = release.upload_url {
            client = client.with_upload_url(url.as_str());
        }
    }
    Ok(client)
}
