//! Changelog collection through the user's editor.
//!
//! The draft lives at a deterministic path keyed by project name and
//! version, so an interrupted session (editor crash, failed upload) can
//! pick up where it left off. A new draft is seeded with placeholder text;
//! lines starting with `//` are instructions and are dropped on read-back.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::project::ProjectInfo;
use crate::template::{self, TemplateError};

/// Placeholder text for a new changelog draft.
const PRETEXT: &str = "\
// New release for {{.Name}} v{{.Version}}
// All lines starting with '//' will be excluded from final changelog
// Insert changelog below this comment. An example format has been given:

## v{{.Version}} ({{.Date}})

FEATURES:

* **Feature Name**: Description about new feature this release

IMPROVEMENTS:

* **Improvement Name**: Description about new improvement this release

BUG FIXES:

* topic: Description of the bug. Example below [bug#]
* api: Fix Go API using lease revocation via URL instead of body [GH-7777]
";

/// Editor used when neither `VISUAL` nor `EDITOR` is set.
const FALLBACK_EDITOR: &str = "vi";

/// Errors from collecting a changelog.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// No editor configured and the fallback is not on `PATH`.
    #[error("no editor found: set VISUAL or EDITOR, or install {FALLBACK_EDITOR}")]
    EditorNotFound,

    /// The editor could not be started.
    #[error("failed to launch editor `{editor}`: {source}")]
    EditorLaunch {
        /// The editor program.
        editor: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The editor exited with a non-zero status.
    #[error("editor `{editor}` exited with {status}")]
    EditorFailed {
        /// The editor program.
        editor: String,
        /// Exit status description.
        status: String,
    },

    /// Reading or writing the draft failed.
    #[error("changelog draft {path}: {source}")]
    Io {
        /// The draft path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The placeholder text could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// A collected changelog.
#[derive(Debug, Clone)]
pub struct Changelog {
    /// Draft file the notes were read from.
    pub path: Utf8PathBuf,
    /// Notes with instruction lines removed.
    pub body: Vec<u8>,
    /// Whether an existing draft was reused.
    pub recovered: bool,
}

/// Something that can produce release notes for a project.
pub trait ChangelogSource {
    /// Collect release notes for the project's current version.
    fn collect(&self, info: &ProjectInfo) -> ChangelogResult<Changelog>;

    /// Remove the draft once the notes have been published.
    fn discard(&self, changelog: &Changelog) -> ChangelogResult<()>;
}

/// Collects notes by opening a draft in the user's editor.
#[derive(Debug, Clone)]
pub struct ChangelogEditor {
    scratch_dir: Utf8PathBuf,
    editor: Option<String>,
}

impl Default for ChangelogEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangelogEditor {
    /// Editor that keeps drafts in the system temp directory and resolves
    /// the editor from the environment.
    pub fn new() -> Self {
        let scratch_dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
        Self {
            scratch_dir,
            editor: None,
        }
    }

    /// Keep drafts in `dir` instead of the system temp directory.
    pub fn with_scratch_dir<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Use this editor command instead of consulting the environment.
    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    /// Draft path for a project and version.
    pub fn draft_path(&self, info: &ProjectInfo) -> Utf8PathBuf {
        self.scratch_dir
            .join(format!("changelog_{}_{}.md", info.name, info.version))
    }

    fn editor_command(&self) -> ChangelogResult<Vec<String>> {
        if let Some(ref editor) = self.editor {
            return resolve_editor(Some(editor), None, || None);
        }
        let visual = std::env::var("VISUAL").ok();
        let editor = std::env::var("EDITOR").ok();
        resolve_editor(visual.as_deref(), editor.as_deref(), || {
            which::which(FALLBACK_EDITOR)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
    }
}

impl ChangelogSource for ChangelogEditor {
    #[instrument(skip_all, fields(name = %info.name, version = %info.version))]
    fn collect(&self, info: &ProjectInfo) -> ChangelogResult<Changelog> {
        let path = self.draft_path(info);
        let io_err = |source| ChangelogError::Io {
            path: path.clone(),
            source,
        };

        let recovered = path.is_file();
        if recovered {
            info!(%path, "recovered previous changelog");
        } else {
            let pretext = template::render(PRETEXT, info)?;
            std::fs::write(&path, pretext).map_err(io_err)?;
            debug!(%path, "created changelog draft");
        }

        let argv = self.editor_command()?;
        open_in_editor(&argv, &path)?;

        let raw = std::fs::read(&path).map_err(io_err)?;
        Ok(Changelog {
            body: strip_comments(&raw),
            path,
            recovered,
        })
    }

    fn discard(&self, changelog: &Changelog) -> ChangelogResult<()> {
        match std::fs::remove_file(&changelog.path) {
            Ok(()) => {
                debug!(path = %changelog.path, "removed changelog draft");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ChangelogError::Io {
                path: changelog.path.clone(),
                source,
            }),
        }
    }
}

/// Pick the editor command: `visual`, then `editor`, then `fallback()`.
///
/// Empty values count as unset. The chosen string is split on whitespace so
/// commands like `code --wait` work.
pub fn resolve_editor(
    visual: Option<&str>,
    editor: Option<&str>,
    fallback: impl FnOnce() -> Option<String>,
) -> ChangelogResult<Vec<String>> {
    let chosen = [visual, editor]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(fallback)
        .ok_or(ChangelogError::EditorNotFound)?;

    let argv: Vec<String> = chosen.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        return Err(ChangelogError::EditorNotFound);
    }
    Ok(argv)
}

/// Drop every line whose trimmed content starts with `//`.
pub fn strip_comments(data: &[u8]) -> Vec<u8> {
    data.split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().starts_with(b"//"))
        .collect::<Vec<_>>()
        .join(&b'\n')
}

fn open_in_editor(argv: &[String], path: &Utf8Path) -> ChangelogResult<()> {
    let Some((program, args)) = argv.split_first() else {
        return Err(ChangelogError::EditorNotFound);
    };
    debug!(%program, %path, "launching editor");

    let status = Command::new(program)
        .args(args)
        .arg(path.as_str())
        .status()
        .map_err(|source| ChangelogError::EditorLaunch {
            editor: program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(ChangelogError::EditorFailed {
            editor: program.clone(),
            status: status.to_string(),
        });
    }
    Ok(())
}
