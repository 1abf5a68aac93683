//! Command implementations

pub mod build;

pub mod deploy;

pub mod release;

use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, warn};

use toolkit_core::config::Config;
use toolkit_core::git;
use toolkit_core::pipeline::{Stage, StageEvent, StageOutcome, StageReport};
use toolkit_core::project::ProjectInfo;
use toolkit_core::version;

/// Output switches shared by every subcommand.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Print each command before it runs.
    pub echo_commands: bool,
    /// Suppress command output.
    pub hide_output: bool,
    /// Print a JSON report instead of progress lines.
    pub json: bool,
}

/// Parse the version argument and build the project record.
///
/// An empty `repository` in the config falls back to the `origin` remote.
pub fn load_project(config: &Config, version: &str) -> anyhow::Result<ProjectInfo> {
    let version = version::parse_version(version)
        .with_context(|| format!("invalid version argument: {version}"))?;

    if config.repository.trim().is_empty() {
        let origin = git::origin_repository()
            .context("no repository configured and the origin remote could not be read")?
            .context("no repository configured and no origin remote found")?;
        debug!(repository = %origin, "using origin remote as repository");
        let config = Config {
            repository: origin,
            ..config.clone()
        };
        return Ok(ProjectInfo::from_config(&config, version)?);
    }

    Ok(ProjectInfo::from_config(config, version)?)
}

/// Print the final summary, or the JSON report.
pub fn print_report(report: &StageReport, output: OutputOptions, summary: &str) -> anyhow::Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!();
        println!("{} {}", "✓".green().bold(), summary);
    }
    Ok(())
}

/// Terminal display for pipeline events.
///
/// Shows a spinner per stage except the changelog, which needs the
/// terminal for the editor.
pub struct Progress {
    output: OutputOptions,
    spinner: Option<ProgressBar>,
}

impl Progress {
    /// Create a display with the given output switches.
    pub const fn new(output: OutputOptions) -> Self {
        Self {
            output,
            spinner: None,
        }
    }

    /// Handle one pipeline event.
    pub fn handle(&mut self, event: StageEvent) {
        if self.output.json {
            if let StageEvent::Warning { stage, message } = event {
                warn!(%stage, %message, "stage warning");
            }
            return;
        }

        match event {
            StageEvent::StageStarted(stage) => {
                self.clear();
                if stage != Stage::Changelog {
                    self.spinner = Some(stage_spinner(stage));
                }
            }
            StageEvent::StageCompleted(stage, outcome) => {
                self.clear();
                print_outcome(stage, &outcome);
            }
            StageEvent::CommandStarted { command, .. } => {
                if let Some(ref spinner) = self.spinner {
                    spinner.set_message(command.clone());
                }
                if self.output.echo_commands {
                    self.print(&format!("  {} {}", "$".dimmed(), command.bold()));
                }
            }
            StageEvent::CommandFinished { output, .. } => {
                let text = output.output.trim_end();
                if !self.output.hide_output && !text.is_empty() {
                    self.print(text);
                }
            }
            StageEvent::Notice { message, .. } => {
                self.print(&format!("  {} {}", "·".cyan(), message));
            }
            StageEvent::Warning { message, .. } => {
                self.print(&format!("  {} {}", "!".yellow().bold(), message.yellow()));
            }
        }
    }

    fn print(&self, line: &str) {
        match self.spinner {
            Some(ref spinner) => spinner.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.clear();
    }
}

fn stage_spinner(stage: Stage) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {prefix:.bold} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]),
        );
    }
    spinner.set_prefix(stage.to_string());
    spinner.set_message("...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_outcome(stage: Stage, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Success { message } => {
            println!(
                "  {} {} {}",
                "✓".green(),
                stage.to_string().bold(),
                message.dimmed(),
            );
        }
        StageOutcome::Skipped { reason } => {
            println!(
                "  {} {} {}",
                "–".yellow(),
                stage.to_string().bold(),
                format!("skipped: {reason}").dimmed(),
            );
        }
    }
}
