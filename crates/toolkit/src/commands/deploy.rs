//! Deploy command — fetch a published binary and run the deploy commands
//! on a remote host.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use tracing::{debug, instrument};

use toolkit_core::config::Config;
use toolkit_core::deploy::{DeployTarget, HttpDownloader, SshOptions, SshShell};
use toolkit_core::pipeline::{self, DeployDeps, DeployOptions};
use toolkit_core::runner::ShellRunner;

use super::{OutputOptions, Progress};

/// Arguments for the `deploy` subcommand.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Version to deploy (must already be released)
    pub semver: String,

    /// Remote destination as user@host
    pub target: String,
}

/// Execute the deploy command.
#[instrument(name = "cmd_deploy", skip_all, fields(semver = %args.semver, target = %args.target))]
pub fn cmd_deploy(
    args: DeployArgs,
    output: OutputOptions,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = output.json, "executing deploy command");

    let target: DeployTarget = args.target.parse()?;
    let mut info = super::load_project(config, &args.semver)?;

    let options = deploy_options(config);
    debug!(
        identity_file = %options.ssh.identity_file,
        port = options.ssh.port,
        download_base = %options.download_base,
        "resolved deploy options"
    );

    let runner = ShellRunner::new().with_working_dir(cwd);
    let downloader = HttpDownloader::new()?;
    let shell = SshShell::new(options.ssh.clone());
    let deps = DeployDeps {
        executor: &runner,
        downloader: &downloader,
        shell: &shell,
    };

    let mut progress = Progress::new(output);
    let report = pipeline::run_deploy(&mut info, &target, &options, &deps, |event| {
        progress.handle(event);
    })
    .context("deploy failed")?;
    drop(progress);

    super::print_report(
        &report,
        output,
        &format!("Deployed {} {} to {target}", info.name, info.tag()),
    )
}

/// Deploy options from the config's `deploy` and `release` sections.
fn deploy_options(config: &Config) -> DeployOptions {
    let home = directories::BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok());
    let deploy = config.deploy.clone().unwrap_or_default();
    let ssh = SshOptions::resolve(deploy.identity_file.as_deref(), deploy.port, home.as_deref());

    let mut options = DeployOptions::new(ssh);
    if let Some(url) = config.release.as_ref().and_then(|r| r.download_url.clone()) {
        options.download_base = url;
    }
    options
}
