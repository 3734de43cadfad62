//! Error types shared across the Hermit crates.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Hermit operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No manifest matched the requested package.
    #[error("no such package '{name}'{}", known_hint(.known))]
    UnknownPackage {
        /// Requested package name (or full selector).
        name: String,
        /// Known versions/channels of the package, if the name itself
        /// resolved but the constraint did not.
        known: Vec<String>,
    },

    /// A manifest failed to parse or validate.
    #[error("{}{}: {message}", .path.display(), .line.map(|l| format!(":{l}")).unwrap_or_default())]
    InvalidManifest {
        /// Manifest path (bundle-relative or absolute).
        path: PathBuf,
        /// Line number within the manifest, when known.
        line: Option<usize>,
        /// What went wrong.
        message: String,
    },

    /// The package has no source for the requested platform.
    #[error("package {reference} does not support platform {platform}")]
    UnsupportedPlatform {
        /// Fully-qualified reference.
        reference: String,
        /// `os/arch` pair.
        platform: String,
    },

    /// An archive entry or link target would escape the destination.
    #[error("illegal file path {path:?}")]
    IllegalPath {
        /// Offending (cleaned) path.
        path: PathBuf,
    },

    /// A download failed.
    #[error("download of {url} failed: {message}")]
    Download {
        /// Source URL.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// Downloaded content did not match its recorded digest.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Source URL.
        url: String,
        /// Expected SHA-256 (hex).
        expected: String,
        /// Computed SHA-256 (hex).
        actual: String,
    },

    /// Lock acquisition exceeded its deadline.
    #[error("timed out waiting for lock {}{}", .path.display(), .holder.as_deref().map(|h| format!(" (held by {h})")).unwrap_or_default())]
    LockTimeout {
        /// Lock file path.
        path: PathBuf,
        /// Diagnostic payload from the holding process, if readable.
        holder: Option<String>,
    },

    /// The lock file could not be created or probed at all.
    #[error("lock {} unavailable: {message}", .path.display())]
    LockUnavailable {
        /// Lock file path.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// Archive-level failure (corrupt input, unsupported format, ...).
    #[error("archive error{}: {message}", .path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    Archive {
        /// What went wrong.
        message: String,
        /// Archive path, when known.
        path: Option<PathBuf>,
    },

    /// A lifecycle trigger action failed.
    #[error("{package}: on {event}: {message}")]
    Trigger {
        /// Package reference.
        package: String,
        /// Lifecycle event name.
        event: String,
        /// Action failure.
        message: String,
    },

    /// I/O error with path context.
    #[error("{}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Subprocess invocation failed.
    #[error("{command}: {message}")]
    Command {
        /// The program and arguments that were run.
        command: String,
        /// Exit status or spawn failure.
        message: String,
    },

    /// A command requested a specific process exit code.
    #[error("exit code {code}")]
    Exit {
        /// Process exit code to propagate.
        code: i32,
    },

    /// Catch-all with a context prefix.
    #[error("{context}: {message}")]
    Other {
        /// Operation that failed.
        context: String,
        /// Failure detail.
        message: String,
    },
}

impl Error {
    /// I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Invalid-manifest error without a line number.
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            line: None,
            message: message.into(),
        }
    }

    /// Invalid-manifest error pinned to a source line.
    pub fn manifest_at(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            line: Some(line),
            message: message.into(),
        }
    }

    /// Generic contextual error.
    pub fn other(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Exit code carried by this error, for the CLI boundary.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code } => *code,
            _ => 1,
        }
    }
}

fn known_hint(known: &[String]) -> String {
    if known.is_empty() {
        String::new()
    } else {
        format!(", known: {}", known.join(", "))
    }
}
