//! State directory layout.
//!
//! Everything Hermit materializes lives under a per-user state root:
//! `pkg/<name-version>/` package trees, `sources/<hash>/` git checkouts,
//! and `metadata/<ref>.etag` sidecars whose content is the last-seen ETag
//! and whose mtime is the last update check.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Resolved state directory layout.
#[derive(Debug, Clone)]
pub struct StateDirs {
    root: PathBuf,
}

impl StateDirs {
    /// Use an explicit state root.
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the state root from the environment: `HERMIT_STATE_DIR`,
    /// then `HERMIT_USER_HOME/.cache/hermit`, then the platform cache dir.
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = std::env::var("HERMIT_STATE_DIR") {
            return Ok(Self::at(dir));
        }
        if let Ok(home) = std::env::var("HERMIT_USER_HOME") {
            return Ok(Self::at(PathBuf::from(home).join(".cache").join("hermit")));
        }
        let cache = dirs::cache_dir()
            .ok_or_else(|| Error::other("state", "cannot determine cache directory"))?;
        Ok(Self::at(cache.join("hermit")))
    }

    /// The state root itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Install directory for a fully-qualified reference.
    #[must_use]
    pub fn pkg_dir(&self, reference: &str) -> PathBuf {
        self.root.join("pkg").join(reference)
    }

    /// Checkout directory for a manifest source URI.
    #[must_use]
    pub fn source_dir(&self, uri: &str) -> PathBuf {
        self.root.join("sources").join(uri_hash(uri))
    }

    /// ETag sidecar for a reference.
    #[must_use]
    pub fn etag_path(&self, reference: &str) -> PathBuf {
        self.root.join("metadata").join(format!("{reference}.etag"))
    }

    /// Read the last-seen ETag, if any.
    #[must_use]
    pub fn read_etag(&self, reference: &str) -> Option<String> {
        std::fs::read_to_string(self.etag_path(reference))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Record an ETag; the sidecar mtime doubles as the last-check time.
    pub fn write_etag(&self, reference: &str, etag: &str) -> Result<()> {
        let path = self.etag_path(reference);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(&path, etag).map_err(|e| Error::io(&path, e))
    }
}

/// First 16 hex characters of the SHA-256 of a source URI.
#[must_use]
pub fn uri_hash(uri: &str) -> String {
    let digest = Sha256::digest(uri.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let dirs = StateDirs::at("/tmp/hermit-state");
        assert_eq!(
            dirs.pkg_dir("go-1.21.3"),
            PathBuf::from("/tmp/hermit-state/pkg/go-1.21.3")
        );
        assert!(dirs
            .source_dir("https://github.com/cashapp/hermit-packages.git")
            .starts_with("/tmp/hermit-state/sources"));
    }

    #[test]
    fn uri_hash_is_stable() {
        let a = uri_hash("https://example.com/a.git");
        assert_eq!(a.len(), 16);
        assert_eq!(a, uri_hash("https://example.com/a.git"));
        assert_ne!(a, uri_hash("https://example.com/b.git"));
    }

    #[test]
    fn etag_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = StateDirs::at(dir.path());
        dirs.write_etag("go-1.21.3", "\"abc123\"").unwrap();
        assert_eq!(dirs.read_etag("go-1.21.3").unwrap(), "\"abc123\"");
        assert_eq!(dirs.read_etag("missing"), None);
    }
}
