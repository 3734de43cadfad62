//! Git tag listing via `git ls-remote`.

use hermit_core::{Error, Result};
use std::process::Command;

/// Lists tags of a git remote.
pub trait TagLister: Sync {
    /// Tag names (without `refs/tags/`).
    fn tags(&self, remote: &str) -> Result<Vec<String>>;
}

/// Tag lister shelling out to `git`.
#[derive(Debug, Default)]
pub struct GitCli;

impl TagLister for GitCli {
    fn tags(&self, remote: &str) -> Result<Vec<String>> {
        let output = Command::new("git")
            .args(["ls-remote", "--tags", "--refs", remote])
            .output()
            .map_err(|e| Error::Command {
                command: format!("git ls-remote --tags --refs {remote}"),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::Command {
                command: format!("git ls-remote --tags --refs {remote}"),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_ls_remote(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `<oid>\t<ref>` lines into tag names.
#[must_use]
pub fn parse_ls_remote(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split('\t').nth(1))
        .filter_map(|r| r.strip_prefix("refs/tags/"))
        .map(str::to_string)
        .collect()
}

/// Fixed lister for tests.
#[derive(Debug, Default)]
pub struct MemTags(pub Vec<String>);

impl TagLister for MemTags {
    fn tags(&self, _remote: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}
