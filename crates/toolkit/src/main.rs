//! toolkit CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use toolkit::commands::{self, OutputOptions};
use toolkit::{Cli, Commands};
use toolkit_core::config::{Config, ConfigLoader};
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let loaded = loader
        .load_or_error()
        .context("failed to load configuration");

    // Logging comes up even without a config so the failure is recorded.
    let defaults = Config::default();
    let config = loaded.as_ref().unwrap_or(&defaults);
    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(
        cli.quiet,
        cli.verbose,
        obs_config.debug,
        config.log_level.as_str(),
    );
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let output = OutputOptions {
        echo_commands: cli.echo_commands,
        hide_output: cli.hide_output,
        json: cli.json,
    };

    let result = loaded.and_then(|config| match cli.command {
        Commands::Build(args) => commands::build::cmd_build(args, output, &config, &cwd),
        Commands::Release(args) => commands::release::cmd_release(args, output, &config, &cwd),
        Commands::Deploy(args) => commands::deploy::cmd_deploy(args, output, &config, &cwd),
    });
    if let Err(ref err) = result {
        tracing::error!(error = %format!("{err:#}"), "fatal error");
    }
    result
}
