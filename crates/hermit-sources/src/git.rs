//! Git-backed manifest sources.
//!
//! Each remote is checked out under `sources/<uri-hash>` in the state
//! directory. The first sync is a shallow clone into a temp directory
//! renamed into place; later syncs `git pull`, tolerating failures on an
//! established clone (a broken network should not break resolution). The
//! checkout's mtime records the last sync; 24 hours counts as fresh.

use crate::Source;
use hermit_core::{Error, Result, StateDirs};
use hermit_manifest::{Bundle, DirBundle};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SYNC_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// A git remote of manifests.
#[derive(Debug)]
pub struct GitSource {
    url: String,
    dir: PathBuf,
}

impl GitSource {
    /// Source for a remote URL, checked out under the state directory.
    #[must_use]
    pub fn new(url: impl Into<String>, state: &StateDirs) -> Self {
        let url = url.into();
        let dir = state.source_dir(&url);
        Self { url, dir }
    }

    /// The local checkout directory.
    #[must_use]
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn fresh(&self) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.dir) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        modified
            .elapsed()
            .map(|elapsed| elapsed < SYNC_INTERVAL)
            .unwrap_or(false)
    }

    fn clone_fresh(&self) -> Result<()> {
        let parent = self
            .dir
            .parent()
            .ok_or_else(|| Error::other("git", "source directory has no parent"))?;
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".clone-")
            .tempdir_in(parent)
            .map_err(|e| Error::io(parent, e))?;

        run_git(
            Command::new("git")
                .arg("clone")
                .arg("--depth=1")
                .arg(&self.url)
                .arg(staging.path()),
        )?;

        let staged = staging.into_path();
        if let Err(e) = std::fs::rename(&staged, &self.dir) {
            let _ = std::fs::remove_dir_all(&staged);
            return Err(Error::io(&self.dir, e));
        }
        Ok(())
    }
}

impl Source for GitSource {
    fn uri(&self) -> &str {
        &self.url
    }

    fn sync(&self, force: bool) -> Result<()> {
        if self.dir.join(".git").is_dir() {
            if !force && self.fresh() {
                debug!(url = %self.url, "checkout is fresh");
                return Ok(());
            }
            // Tolerated: an established clone keeps working offline.
            if let Err(e) = run_git(Command::new("git").arg("pull").current_dir(&self.dir)) {
                warn!(url = %self.url, error = %e, "git pull failed, using stale checkout");
            }
            let _ = filetime::set_file_mtime(&self.dir, filetime::FileTime::now());
            return Ok(());
        }
        self.clone_fresh()
    }

    fn bundle(&self) -> Result<Arc<dyn Bundle>> {
        Ok(Arc::new(DirBundle::new(&self.dir)))
    }
}

fn run_git(command: &mut Command) -> Result<()> {
    let describe = format!("{command:?}");
    let output = command.output().map_err(|e| Error::Command {
        command: describe.clone(),
        message: e.to_string(),
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Command {
            command: describe,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn init_repo(dir: &std::path::Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir)
                .env("GIT_AUTHOR_NAME", "test")
                .env("GIT_AUTHOR_EMAIL", "test@example.com")
                .env("GIT_COMMITTER_NAME", "test")
                .env("GIT_COMMITTER_EMAIL", "test@example.com")
                .output()
                .unwrap();
            assert!(status.status.success(), "git {args:?} failed");
        };
        run(&["init", "--initial-branch=main"]);
        std::fs::write(dir.join("jq.hcl"), "description = \"jq\"\nbinaries = [\"jq\"]\n")
            .unwrap();
        run(&["add", "."]);
        run(&["commit", "-m", "add jq"]);
    }

    #[test]
    fn clone_then_cached_sync() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let remote = tmp.path().join("remote");
        std::fs::create_dir(&remote).unwrap();
        init_repo(&remote);

        let state = StateDirs::at(tmp.path().join("state"));
        let source = GitSource::new(remote.display().to_string(), &state);
        source.sync(false).unwrap();
        assert!(source.dir().join(".git").is_dir());

        let bundle = source.bundle().unwrap();
        assert_eq!(bundle.list().unwrap(), vec!["jq.hcl".to_string()]);

        // A fresh checkout is not re-synced; a forced sync pulls.
        source.sync(false).unwrap();
        source.sync(true).unwrap();
    }
}
