//! Bundles: filesystem-shaped containers of manifest files.
//!
//! The loader only needs three operations, so backends stay trivial: a
//! local directory, an in-memory map (tests, overrides), and the git /
//! builtin sources provided by `hermit-sources`.

use hermit_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

/// A container of `<package>.hcl` manifest files.
pub trait Bundle: Debug + Send + Sync {
    /// Identifying URI, used in diagnostics.
    fn uri(&self) -> String;

    /// Read a file by bundle-relative path.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Read a file as UTF-8.
    fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::other(format!("{}/{path}", self.uri()), e.to_string()))
    }

    /// File names (not paths) of every `*.hcl` in the bundle.
    fn list(&self) -> Result<Vec<String>>;
}

/// A bundle rooted at a local directory.
#[derive(Debug)]
pub struct DirBundle {
    dir: PathBuf,
}

impl DirBundle {
    /// Wrap a directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Bundle for DirBundle {
    fn uri(&self) -> String {
        self.dir.display().to_string()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.dir.join(path);
        std::fs::read(&full).map_err(|e| Error::io(&full, e))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(".hcl") && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// An in-memory bundle, keyed by file name.
#[derive(Debug, Default)]
pub struct MemBundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemBundle {
    /// Empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl Bundle for MemBundle {
    fn uri(&self) -> String {
        "mem://".to_string()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|name| name.ends_with(".hcl"))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_bundle_lists_only_manifests() {
        let bundle = MemBundle::new()
            .with("go.hcl", "description = \"go\"")
            .with("README.md", "nope");
        assert_eq!(bundle.list().unwrap(), vec!["go.hcl".to_string()]);
        assert!(bundle.read("go.hcl").is_ok());
        assert!(bundle.read("rust.hcl").is_err());
    }

    #[test]
    fn dir_bundle_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jq.hcl"), "description = \"jq\"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let bundle = DirBundle::new(dir.path());
        assert_eq!(bundle.list().unwrap(), vec!["jq.hcl".to_string()]);
        assert!(bundle.read_to_string("jq.hcl").unwrap().contains("jq"));
    }
}
