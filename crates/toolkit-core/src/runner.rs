//! Shell command execution.
//!
//! Rendered commands run one at a time through `bash -c` with stderr merged
//! into stdout. A command that outlives its deadline is killed and reported
//! along with whatever output it produced.
//!
//! Stages depend on the [`CommandExecutor`] trait rather than on
//! [`ShellRunner`] directly so they can be exercised with a recording fake.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Default per-command deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to wait for the output reader after a killed child.
const KILL_DRAIN: Duration = Duration::from_millis(500);

/// How long to wait for the output reader after a normal exit.
const EXIT_DRAIN: Duration = Duration::from_secs(5);

/// Errors from running shell commands.
#[derive(Error, Debug)]
pub enum RunError {
    /// The shell could not be started.
    #[error("failed to start command `{command}`: {source}")]
    Spawn {
        /// The command that was being started.
        command: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    #[error("command `{command}` failed ({}): {output}", exit_label(.exit_code))]
    Failed {
        /// The command that failed.
        command: String,
        /// The exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },

    /// The command ran past its deadline and was killed.
    #[error("command `{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut {
        /// The command that timed out.
        command: String,
        /// The deadline that fired.
        timeout: Duration,
        /// Output produced before the kill.
        output: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit code {c}"))
}

/// Result alias for command execution.
pub type RunResult<T> = Result<T, RunError>;

/// Result of running a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The literal command that ran.
    pub command: String,
    /// Combined stdout and stderr.
    pub output: String,
    /// How long the command took to run.
    pub duration: Duration,
}

/// Something that can execute a rendered shell command.
pub trait CommandExecutor {
    /// Run one command to completion.
    fn run(&self, command: &str) -> RunResult<CommandOutput>;
}

/// Executes commands through `bash -c` on the local machine.
///
/// The child inherits the process environment plus any pairs added with
/// [`with_env`](Self::with_env).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    env: Vec<(String, String)>,
    working_dir: Option<Utf8PathBuf>,
    timeout: Duration,
    exit_drain: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    /// Create a runner with the default ten-minute deadline.
    pub const fn new() -> Self {
        Self {
            env: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
            exit_drain: EXIT_DRAIN,
        }
    }

    /// Add an environment variable for every command this runner starts.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run commands from the given directory instead of the current one.
    pub fn with_working_dir<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Override the per-command deadline.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CommandExecutor for ShellRunner {
    #[instrument(skip(self), fields(timeout_secs = self.timeout.as_secs()))]
    fn run(&self, command: &str) -> RunResult<CommandOutput> {
        let spawn_err = |source| RunError::Spawn {
            command: command.to_string(),
            source,
        };

        let (mut reader, writer) = std::io::pipe().map_err(spawn_err)?;
        let writer_clone = writer.try_clone().map_err(spawn_err)?;

        let mut cmd = Command::new("bash");
        cmd.args(["-c", command])
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(writer_clone)
            .stderr(writer);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir.as_std_path());
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(spawn_err)?;
        // The parent's copies of the write end must close or the reader never sees EOF.
        drop(cmd);

        let captured = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();
        let sink = Arc::clone(&captured);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            while let Ok(n) = reader.read(&mut chunk) {
                if n == 0 {
                    break;
                }
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            let _ = done_tx.send(());
        });

        let deadline = start + self.timeout;
        let status = loop {
            match child.try_wait().map_err(spawn_err)? {
                Some(status) => break Some(status),
                None if Instant::now() >= deadline => break None,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let Some(status) = status else {
            warn!(command, "command timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            let output = drain(command, &captured, &done_rx, KILL_DRAIN);
            return Err(RunError::TimedOut {
                command: command.to_string(),
                timeout: self.timeout,
                output,
            });
        };

        // Background processes may hold the pipe open after the shell exits.
        let output = drain(command, &captured, &done_rx, self.exit_drain);
        let duration = start.elapsed();
        debug!(
            command,
            success = status.success(),
            duration_ms = duration.as_millis(),
            "command finished"
        );

        if !status.success() {
            return Err(RunError::Failed {
                command: command.to_string(),
                exit_code: status.code(),
                output,
            });
        }

        Ok(CommandOutput {
            command: command.to_string(),
            output,
            duration,
        })
    }
}

/// Wait up to `wait` for the reader to hit EOF, then take what it has.
fn drain(
    command: &str,
    captured: &Mutex<Vec<u8>>,
    done: &mpsc::Receiver<()>,
    wait: Duration,
) -> String {
    if done.recv_timeout(wait).is_err() {
        warn!(command, "output pipe still open; keeping what was read so far");
    }
    captured
        .lock()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
