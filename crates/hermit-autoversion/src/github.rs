//! Minimal GitHub release oracle.
//!
//! Only the contract the auto-version engine needs: the latest release
//! tag, or a bounded page of recent tags.

use crate::fetch::UrlFetcher;
use hermit_core::{Error, Result};
use std::process::Command;
use tracing::debug;

/// Source of release tags for an `owner/repo`.
pub trait ReleaseOracle: Sync {
    /// Tag of the latest (non-draft, non-prerelease) release.
    fn latest(&self, repo: &str) -> Result<Option<String>>;

    /// Recent release tags, newest first, bounded by `limit`.
    fn list(&self, repo: &str, limit: usize) -> Result<Vec<String>>;
}

/// GitHub API client over an HTTP fetcher.
pub struct GitHubClient<'a> {
    fetcher: &'a dyn UrlFetcher,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubClient<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl<'a> GitHubClient<'a> {
    /// Client resolving its token from `HERMIT_GITHUB_TOKEN`,
    /// `GITHUB_TOKEN`, then `gh auth token`.
    #[must_use]
    pub fn new(fetcher: &'a dyn UrlFetcher) -> Self {
        Self {
            fetcher,
            token: resolve_token(),
        }
    }

    fn get(&self, url: &str) -> Result<serde_json::Value> {
        let mut headers = vec![(
            "Accept".to_string(),
            "application/vnd.github+json".to_string(),
        )];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        let body = self.fetcher.fetch(url, &headers)?;
        serde_json::from_slice(&body).map_err(|e| Error::Download {
            url: url.to_string(),
            message: format!("invalid JSON response: {e}"),
        })
    }
}

impl ReleaseOracle for GitHubClient<'_> {
    fn latest(&self, repo: &str) -> Result<Option<String>> {
        let url = format!("https://api.github.com/repos/{repo}/releases/latest");
        let value = self.get(&url)?;
        Ok(value
            .get("tag_name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string))
    }

    fn list(&self, repo: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("https://api.github.com/repos/{repo}/releases?per_page={limit}");
        let value = self.get(&url)?;
        let releases = value.as_array().cloned().unwrap_or_default();
        Ok(releases
            .iter()
            .filter_map(|r| r.get("tag_name").and_then(serde_json::Value::as_str))
            .map(str::to_string)
            .collect())
    }
}

fn resolve_token() -> Option<String> {
    for key in ["HERMIT_GITHUB_TOKEN", "GITHUB_TOKEN"] {
        if let Ok(token) = std::env::var(key) {
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
    // `gh` keeps its own credential store; use it when available.
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        None
    } else {
        debug!("using token from gh");
        Some(token)
    }
}

/// Fixed oracle for tests.
#[derive(Debug, Default)]
pub struct MemOracle {
    /// Tags returned by `list`, newest first; `latest` returns the first.
    pub tags: Vec<String>,
}

impl ReleaseOracle for MemOracle {
    fn latest(&self, _repo: &str) -> Result<Option<String>> {
        Ok(self.tags.first().cloned())
    }

    fn list(&self, _repo: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self.tags.iter().take(limit).cloned().collect())
    }
}
