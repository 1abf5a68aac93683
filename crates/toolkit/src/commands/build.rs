//! Build command — thin CLI layer over `toolkit_core::pipeline::run_build`.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use tracing::{debug, instrument};

use toolkit_core::config::Config;
use toolkit_core::pipeline;
use toolkit_core::runner::ShellRunner;

use super::{OutputOptions, Progress};

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Version to stamp into the build (e.g., "1.2.3" or "v1.2.3")
    pub semver: String,

    /// Where the binary should be written
    pub path: Utf8PathBuf,
}

/// Execute the build command.
#[instrument(name = "cmd_build", skip_all, fields(semver = %args.semver, path = %args.path))]
pub fn cmd_build(
    args: BuildArgs,
    output: OutputOptions,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = output.json, "executing build command");

    let mut info = super::load_project(config, &args.semver)?;
    let runner = ShellRunner::new().with_working_dir(cwd);

    let mut progress = Progress::new(output);
    let report = pipeline::run_build(&mut info, &args.path, &runner, |event| {
        progress.handle(event);
    })
    .context("build failed")?;
    drop(progress);

    super::print_report(&report, output, &format!("Built {} {}", info.name, args.path))
}
