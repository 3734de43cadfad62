//! Lifecycle trigger actions.
//!
//! Each `on <event> { ... }` block owns typed actions. Actions carry their
//! declared source line so that `ordered()` can interleave different kinds
//! in the order they appear in the manifest.

use crate::bundle::Bundle;
use hermit_core::{Error, Result};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle events a manifest may attach triggers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Event {
    /// After the archive is unpacked, before finalize.
    Unpack,
    /// After the package is installed into the environment.
    Install,
    /// Before the package is removed.
    Uninstall,
    /// Before each execution of a package binary.
    Exec,
    /// When an environment is activated.
    Activate,
}

impl Event {
    /// The closed set of events.
    pub const ALL: [Self; 5] = [
        Self::Unpack,
        Self::Install,
        Self::Uninstall,
        Self::Exec,
        Self::Activate,
    ];

    /// Canonical label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpack => "unpack",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Exec => "exec",
            Self::Activate => "activate",
        }
    }

    /// Parse a block label.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == s)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context for applying actions.
#[derive(Debug)]
pub struct ActionContext {
    /// Package root; the default working directory and the base for
    /// relative paths.
    pub root: PathBuf,
    /// Bundle the manifest came from; `copy` sources resolve against it.
    pub bundle: Option<Arc<dyn Bundle>>,
    /// Extra environment for `run` actions.
    pub env: Vec<(String, String)>,
    /// Accumulated `message` output, returned to the caller rather than
    /// printed.
    pub messages: Vec<String>,
}

impl ActionContext {
    /// Context rooted at a package directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bundle: None,
            env: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

/// A single lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Spawn a subprocess.
    Run {
        /// Command line, shell-split.
        cmd: String,
        /// Working directory (defaults to the package root).
        dir: Option<String>,
        /// Extra `K=V` environment entries.
        env: Vec<String>,
        /// Data piped to stdin.
        stdin: Option<String>,
        /// Declared source line.
        line: usize,
    },
    /// Copy a file from the manifest bundle (or an absolute path).
    Copy {
        /// Source path.
        from: String,
        /// Destination path.
        to: String,
        /// File mode (octal digits), defaults to 0644.
        mode: Option<u32>,
        /// Declared source line.
        line: usize,
    },
    /// Change the mode of a file.
    Chmod {
        /// Target file.
        file: String,
        /// New mode (octal digits).
        mode: u32,
        /// Declared source line.
        line: usize,
    },
    /// Rename a file.
    Rename {
        /// Source path.
        from: String,
        /// Destination path.
        to: String,
        /// Declared source line.
        line: usize,
    },
    /// Delete files.
    Delete {
        /// Recurse into directories.
        recursive: bool,
        /// Paths to delete.
        files: Vec<String>,
        /// Declared source line.
        line: usize,
    },
    /// Create a directory and its parents.
    Mkdir {
        /// Directory to create.
        dir: String,
        /// Mode (octal digits), defaults to 0750.
        mode: Option<u32>,
        /// Declared source line.
        line: usize,
    },
    /// Create a symbolic link.
    Symlink {
        /// Link target.
        from: String,
        /// Link location.
        to: String,
        /// Declared source line.
        line: usize,
    },
    /// Emit a user-visible message.
    Message {
        /// Message text.
        text: String,
        /// Declared source line.
        line: usize,
    },
}

impl Action {
    /// Declared source line, used for ordering.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Run { line, .. }
            | Self::Copy { line, .. }
            | Self::Chmod { line, .. }
            | Self::Rename { line, .. }
            | Self::Delete { line, .. }
            | Self::Mkdir { line, .. }
            | Self::Symlink { line, .. }
            | Self::Message { line, .. } => *line,
        }
    }

    /// Short human description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Run { cmd, .. } => format!("run {cmd}"),
            Self::Copy { from, to, .. } => format!("copy {from} -> {to}"),
            Self::Chmod { file, mode, .. } => format!("chmod {mode:o} {file}"),
            Self::Rename { from, to, .. } => format!("rename {from} -> {to}"),
            Self::Delete { files, .. } => format!("delete {}", files.join(" ")),
            Self::Mkdir { dir, .. } => format!("mkdir {dir}"),
            Self::Symlink { from, to, .. } => format!("symlink {from} -> {to}"),
            Self::Message { text, .. } => format!("message {text:?}"),
        }
    }

    /// Mutable references to every interpolatable string field.
    pub(crate) fn strings_mut(&mut self) -> Vec<&mut String> {
        match self {
            Self::Run {
                cmd, dir, env, stdin, ..
            } => {
                let mut out = vec![cmd];
                out.extend(dir.iter_mut());
                out.extend(env.iter_mut());
                out.extend(stdin.iter_mut());
                out
            }
            Self::Copy { from, to, .. }
            | Self::Rename { from, to, .. }
            | Self::Symlink { from, to, .. } => vec![from, to],
            Self::Chmod { file, .. } => vec![file],
            Self::Delete { files, .. } => files.iter_mut().collect(),
            Self::Mkdir { dir, .. } => vec![dir],
            Self::Message { text, .. } => vec![text],
        }
    }

    /// Apply the action.
    pub fn apply(&self, ctx: &mut ActionContext) -> Result<()> {
        debug!(action = %self.describe(), "applying trigger action");
        match self {
            Self::Run {
                cmd,
                dir,
                env,
                stdin,
                ..
            } => run(ctx, cmd, dir.as_deref(), env, stdin.as_deref()),
            Self::Copy { from, to, mode, .. } => copy(ctx, from, to, *mode),
            Self::Chmod { file, mode, .. } => {
                let path = ctx.resolve(file);
                set_mode(&path, *mode)
            }
            Self::Rename { from, to, .. } => {
                let (from, to) = (ctx.resolve(from), ctx.resolve(to));
                std::fs::rename(&from, &to).map_err(|e| Error::io(&from, e))
            }
            Self::Delete {
                recursive, files, ..
            } => {
                for file in files {
                    let path = ctx.resolve(file);
                    let result = if *recursive && path.is_dir() {
                        std::fs::remove_dir_all(&path)
                    } else {
                        std::fs::remove_file(&path)
                    };
                    result.map_err(|e| Error::io(&path, e))?;
                }
                Ok(())
            }
            Self::Mkdir { dir, mode, .. } => {
                let path = ctx.resolve(dir);
                std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
                set_mode(&path, mode.unwrap_or(0o750))
            }
            Self::Symlink { from, to, .. } => {
                let (from, to) = (ctx.resolve(from), ctx.resolve(to));
                symlink(&from, &to)
            }
            Self::Message { text, .. } => {
                ctx.messages.push(text.clone());
                Ok(())
            }
        }
    }
}

fn run(
    ctx: &ActionContext,
    cmd: &str,
    dir: Option<&str>,
    env: &[String],
    stdin: Option<&str>,
) -> Result<()> {
    let argv = shlex::split(cmd)
        .filter(|argv| !argv.is_empty())
        .ok_or_else(|| Error::Command {
            command: cmd.to_string(),
            message: "cannot split command line".to_string(),
        })?;
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);
    command.current_dir(dir.map_or_else(|| ctx.root.clone(), |d| ctx.resolve(d)));
    for (key, value) in &ctx.env {
        command.env(key, value);
    }
    for entry in env {
        if let Some((key, value)) = entry.split_once('=') {
            command.env(key, value);
        }
    }
    if stdin.is_some() {
        command.stdin(Stdio::piped());
    }
    let mut child = command.spawn().map_err(|e| Error::Command {
        command: cmd.to_string(),
        message: e.to_string(),
    })?;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).map_err(|e| Error::Command {
            command: cmd.to_string(),
            message: format!("writing stdin: {e}"),
        })?;
    }
    let status = child.wait().map_err(|e| Error::Command {
        command: cmd.to_string(),
        message: e.to_string(),
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::Command {
            command: cmd.to_string(),
            message: format!("exited with {status}"),
        })
    }
}

fn copy(ctx: &ActionContext, from: &str, to: &str, mode: Option<u32>) -> Result<()> {
    let to_path = ctx.resolve(to);
    let content = if Path::new(from).is_absolute() {
        std::fs::read(from).map_err(|e| Error::io(from, e))?
    } else if let Some(bundle) = &ctx.bundle {
        bundle.read(from)?
    } else {
        std::fs::read(ctx.resolve(from)).map_err(|e| Error::io(ctx.resolve(from), e))?
    };
    if let Some(parent) = to_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(&to_path, content).map_err(|e| Error::io(&to_path, e))?;
    set_mode(&to_path, mode.unwrap_or(0o644))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(from: &Path, to: &Path) -> Result<()> {
    std::os::unix::fs::symlink(from, to).map_err(|e| Error::io(to, e))
}

#[cfg(not(unix))]
fn symlink(_from: &Path, to: &Path) -> Result<()> {
    Err(Error::io(
        to,
        std::io::Error::new(std::io::ErrorKind::Unsupported, "symlinks unsupported"),
    ))
}
